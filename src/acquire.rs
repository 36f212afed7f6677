use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::archive::{Archive, IndexSummary};
use crate::chunker::{self, Sampling};
use crate::domain::{EventKey, OutputFormat, StationKey, format_time};
use crate::error::ArchiveError;
use crate::fetcher::{ContinuousOptions, DataFetcher, EventOptions};
use crate::layout::{self, CONTINUOUS_DIR_DEFAULT, EVENT_DIR_DEFAULT};
use crate::logging::LogSink;
use crate::waveform::{Stream, WaveformCodec, WaveformWriter};

#[derive(Debug, Clone, PartialEq)]
pub struct AcquireOptions {
    pub event_dir: Utf8PathBuf,
    pub continuous_dir: Utf8PathBuf,
    pub format: OutputFormat,
    pub get_events: bool,
    pub get_continuous: bool,
    pub skip_existing: bool,
    pub sampling: Option<Sampling>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            event_dir: Utf8PathBuf::from(EVENT_DIR_DEFAULT),
            continuous_dir: Utf8PathBuf::from(CONTINUOUS_DIR_DEFAULT),
            format: OutputFormat::Mseed,
            get_events: true,
            get_continuous: true,
            skip_existing: true,
            sampling: None,
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AcquireSummary {
    pub event_files: Vec<String>,
    pub continuous_files: Vec<String>,
    pub event_index: Option<IndexSummary>,
    pub continuous_index: Option<IndexSummary>,
}

pub fn make_data_directories(
    fetcher: &DataFetcher,
    writer: &dyn WaveformWriter,
    codec: Option<Arc<dyn WaveformCodec>>,
    stations: &[StationKey],
    events: &[EventKey],
    options: &AcquireOptions,
) -> Result<AcquireSummary, ArchiveError> {
    let sink = fetcher.sink();
    let mut summary = AcquireSummary::default();

    if options.get_events && !events.is_empty() {
        let mut event_options = EventOptions::from_config(fetcher.config());
        if options.skip_existing {
            event_options = event_options.skip_existing_in(options.event_dir.clone());
        }
        for chunk in fetcher.event_chunks(stations, events, event_options)? {
            let chunk = chunk?;
            let path = layout::event_location(&options.event_dir, &chunk.station, &chunk.event)
                .file_path(options.format);
            write_atomic(writer, &chunk.stream, &path, options.format)?;
            summary.event_files.push(path.to_string());
        }
        summary.event_index = index_if_missing(&options.event_dir, codec.clone(), sink)?;
    }

    if options.get_continuous {
        let mut continuous_options = ContinuousOptions::from_config(fetcher.config());
        continuous_options.start = options.start;
        continuous_options.end = options.end;
        continuous_options.sampling = options.sampling;
        if options.skip_existing {
            continuous_options = continuous_options.skip_existing_in(options.continuous_dir.clone());
        }
        for chunk in fetcher.continuous_chunks(stations, continuous_options)? {
            let chunk = chunk?;
            let path = chunk
                .location(&options.continuous_dir)?
                .file_path(options.format);
            write_atomic(writer, &chunk.stream, &path, options.format)?;
            summary.continuous_files.push(path.to_string());
        }
        summary.continuous_index = index_if_missing(&options.continuous_dir, codec, sink)?;
    }

    sink.info(format!(
        "wrote {} event and {} continuous files",
        summary.event_files.len(),
        summary.continuous_files.len()
    ));
    Ok(summary)
}

pub fn write_atomic(
    writer: &dyn WaveformWriter,
    stream: &Stream,
    dest: &Utf8Path,
    format: OutputFormat,
) -> Result<(), ArchiveError> {
    let parent = dest
        .parent()
        .ok_or_else(|| ArchiveError::Filesystem(format!("invalid destination path {dest}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".seis-archive-")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
    let temp_path = Utf8Path::from_path(temp.path())
        .ok_or_else(|| ArchiveError::Filesystem("non UTF-8 temporary path".to_string()))?;
    writer.write(stream, temp_path, format)?;
    temp.persist(dest.as_std_path())
        .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
    Ok(())
}

fn index_if_missing(
    dir: &Utf8Path,
    codec: Option<Arc<dyn WaveformCodec>>,
    sink: &dyn LogSink,
) -> Result<Option<IndexSummary>, ArchiveError> {
    if !dir.as_std_path().is_dir() || layout::index_path(dir).as_std_path().is_file() {
        return Ok(None);
    }
    let Some(codec) = codec else {
        sink.info(format!("no waveform codec given, {dir} is left unindexed"));
        return Ok(None);
    };
    match Archive::open(dir)?.with_codec(codec).index(sink) {
        Ok(summary) => Ok(Some(summary)),
        Err(ArchiveError::NoReadableFiles(_)) => {
            sink.info(format!("nothing to index in {dir}"));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedChunk {
    pub station: String,
    pub starttime: String,
    pub endtime: String,
    pub path: String,
    pub exists: bool,
}

pub fn plan_continuous(
    stations: &[StationKey],
    options: &ContinuousOptions,
    root: &Utf8Path,
    format: OutputFormat,
    sink: &dyn LogSink,
) -> Result<Vec<PlannedChunk>, ArchiveError> {
    let mut planned = Vec::new();
    for key in stations {
        let (Some(start), Some(end)) = (options.start.or(key.starttime), options.end.or(key.endtime))
        else {
            return Err(ArchiveError::Configuration(format!(
                "no time range given for {}",
                key.id
            )));
        };
        for chunk_start in chunker::chunks(start, end, options.duration, options.sampling, sink)? {
            let location = layout::continuous_location(root, &key.id, chunk_start)?;
            planned.push(PlannedChunk {
                station: key.id.to_string(),
                starttime: format_time(chunk_start),
                endtime: format_time(chunk_start + options.duration + options.buffer),
                path: location.file_path(format).to_string(),
                exists: location.exists(),
            });
        }
    }
    Ok(planned)
}
