use std::fs;
use std::sync::Arc;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use seis_archive::archive::Archive;
use seis_archive::domain::StationId;
use seis_archive::error::ArchiveError;
use seis_archive::index;
use seis_archive::index_db::IndexDb;
use seis_archive::layout;
use seis_archive::logging::{Level, MemorySink};
use seis_archive::waveform::{Stream, Trace, WaveformCodec};

// 2020-01-10T00:00:00Z, day-of-year 010.
const H: f64 = 1_578_614_400.0;

struct JsonCodec;

impl WaveformCodec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Stream, ArchiveError> {
        serde_json::from_slice(bytes).map_err(|err| ArchiveError::Decode(err.to_string()))
    }
}

fn hour(station: &StationId, start: f64) -> Stream {
    ["BHZ", "BHN", "BHE"]
        .iter()
        .map(|channel| {
            Trace::new(
                station.network(),
                station.station(),
                "",
                channel,
                start,
                1.0,
                (0..3600).map(|i| ((i % 13) as f64) - 6.0).collect(),
            )
        })
        .collect()
}

fn write_chunk(root: &Utf8Path, station: &StationId, start: f64) -> Utf8PathBuf {
    let location = layout::continuous_location(root, station, start).unwrap();
    fs::create_dir_all(location.dir.as_std_path()).unwrap();
    let path = location.file_path(seis_archive::domain::OutputFormat::Mseed);
    fs::write(path.as_std_path(), serde_json::to_vec(&hour(station, start)).unwrap()).unwrap();
    path
}

fn fixture() -> (tempfile::TempDir, Utf8PathBuf, Vec<Utf8PathBuf>) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let station: StationId = "NT.STA".parse().unwrap();
    let files = vec![
        write_chunk(&root, &station, H),
        write_chunk(&root, &station, H + 3600.0),
    ];
    (temp, root, files)
}

fn archive(root: &Utf8Path) -> Archive {
    Archive::open(root).unwrap().with_codec(Arc::new(JsonCodec))
}

#[test]
fn query_returns_files_covering_window_in_name_order() {
    let (_temp, root, files) = fixture();
    let sink = MemorySink::new();

    let paths = archive(&root)
        .query("NT.STA", H + 100.0, H + 7000.0, &sink)
        .unwrap()
        .unwrap();

    assert_eq!(paths, files);
    assert!(paths[0].as_str().ends_with("NT.STA/2020/010/NT.STA.2020-010T00-00-00.msd"));
    assert!(root.join(".index.db").as_std_path().is_file());
    assert_eq!(sink.failures(), 0);
}

#[test]
fn query_drops_file_touching_window_edge() {
    let (_temp, root, files) = fixture();
    let sink = MemorySink::new();

    // window of 3710 s: the second file overlaps by 100 s, under the 371 s tolerance
    let paths = archive(&root)
        .query("NT.STA", H - 10.0, H + 3700.0, &sink)
        .unwrap()
        .unwrap();

    assert_eq!(paths, vec![files[0].clone()]);
}

#[test]
fn query_without_matches_is_none() {
    let (_temp, root, _files) = fixture();
    let sink = MemorySink::new();
    let archive = archive(&root);

    assert!(
        archive
            .query("NT.STA", H + 100_000.0, H + 103_600.0, &sink)
            .unwrap()
            .is_none()
    );
    assert!(archive.query("NT.OTH", H, H + 3600.0, &sink).unwrap().is_none());
}

#[test]
fn index_paths_round_trip_and_rebuild_is_stable() {
    let (_temp, root, files) = fixture();
    let sink = MemorySink::new();
    let archive = archive(&root);

    let summary = archive.index(&sink).unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.stations, vec!["NT.STA".to_string()]);
    assert_eq!(summary.depth, 3);

    let first = IndexDb::open(&archive.index_path()).unwrap().load_tables().unwrap();
    for record in &first.records {
        let relative = first.relative_path(record).unwrap();
        assert!(files.contains(&root.join(relative)));
        assert_eq!(record.channel_count, 3);
        assert_eq!(record.trace_count, 3);
        assert_eq!(record.gaps, 0.0);
        assert_eq!(record.duration, 3599.0);
    }

    archive.index(&sink).unwrap();
    let second = IndexDb::open(&archive.index_path()).unwrap().load_tables().unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(first.components.levels(), second.components.levels());
}

#[test]
fn unreadable_files_are_skipped_with_a_warning() {
    let (_temp, root, _files) = fixture();
    let broken = root.join("NT.STA").join("2020").join("010").join("broken.msd");
    fs::write(broken.as_std_path(), b"not a waveform").unwrap();
    let sink = MemorySink::new();

    let tables = index::scan(&root, &JsonCodec, &sink).unwrap();

    assert_eq!(tables.records.len(), 2);
    assert_eq!(sink.count(Level::Warn), 1);
}

#[test]
fn directory_without_waveforms_cannot_be_indexed() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(temp.path()).unwrap();
    fs::write(root.join("notes.txt").as_std_path(), b"hello").unwrap();
    let sink = MemorySink::new();

    let err = archive(root).index(&sink).unwrap_err();
    assert_matches!(err, ArchiveError::NoReadableFiles(_));
}

#[test]
fn query_without_codec_or_index_is_not_indexed() {
    let (_temp, root, _files) = fixture();
    let sink = MemorySink::new();

    let err = Archive::open(&root)
        .unwrap()
        .query("NT.STA", H, H + 3600.0, &sink)
        .unwrap_err();
    assert_matches!(err, ArchiveError::NotIndexed(_));
}

#[test]
fn entries_filter_by_station() {
    let (_temp, root, _files) = fixture();
    let other: StationId = "NT.OTH".parse().unwrap();
    write_chunk(&root, &other, H);
    let sink = MemorySink::new();
    let archive = archive(&root);

    assert_eq!(archive.entries(None, &sink).unwrap().len(), 3);
    let entries = archive.entries(Some("NT.OTH"), &sink).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].starttime, H);
}
