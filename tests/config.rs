use std::fs;

use assert_matches::assert_matches;

use seis_archive::config::{
    Config, ConfigLoader, EventEntry, StationEntry, StationEntryObject, TimeValue,
    default_channels,
};
use seis_archive::domain::{OutputFormat, OutputType};
use seis_archive::error::ArchiveError;
use seis_archive::fetcher::{FetchMethod, InventorySpec};

#[test]
fn parse_config_shorthand_and_detailed() {
    let config = Config {
        stations: vec![
            StationEntry::Shorthand("UU.SRU".to_string()),
            StationEntry::Detailed(StationEntryObject {
                network: "TA".to_string(),
                station: "M17A".to_string(),
                channels: Some("BHZ-BHN-BHE".to_string()),
                location: Some("00".to_string()),
                starttime: Some(TimeValue::Text("2009-04-01".to_string())),
                endtime: Some(TimeValue::Epoch(1_238_630_400.0)),
            }),
        ],
        events: vec![EventEntry {
            name: "quake".to_string(),
            time: TimeValue::Text("2009-04-01T12:30:00Z".to_string()),
        }],
        ..Config::default()
    };

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.stations.len(), 2);
    assert_eq!(resolved.stations[0].channels, default_channels());
    assert_eq!(resolved.stations[0].starttime, None);

    let detailed = &resolved.stations[1];
    assert_eq!(detailed.id.to_string(), "TA.M17A");
    assert_eq!(detailed.channels, vec!["BHZ", "BHN", "BHE"]);
    assert_eq!(detailed.location, "00");
    assert_eq!(detailed.starttime, Some(1_238_544_000.0));
    assert_eq!(detailed.endtime, Some(1_238_630_400.0));

    assert_eq!(resolved.events[0].origin, 1_238_544_000.0 + 12.5 * 3600.0);
}

#[test]
fn resolve_reads_json_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("seis-archive.json");
    fs::write(
        &path,
        r#"{
            "fetch": {"method": "IRIS", "output_type": "DISP", "fill_zeros": true, "duration": 1800},
            "stations": ["UU.SRU", {"network": "UU", "station": "CTU", "channels": "EHZ"}],
            "events": [{"name": "e1", "time": 1186400000}]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.fetch.method, FetchMethod::Iris);
    assert_eq!(resolved.fetch.output_type, OutputType::Disp);
    assert!(resolved.fetch.fill_zeros);
    assert_eq!(resolved.fetch.duration, 1800.0);
    assert_eq!(resolved.fetch.query_tolerance().load_buffer, 5400.0);
    assert_eq!(resolved.fetch.time_before_origin, 60.0);
    assert_eq!(resolved.fetch.inventory, None);
    assert_eq!(resolved.stations[1].channels, vec!["EHZ"]);
    assert_eq!(resolved.events[0].origin, 1_186_400_000.0);
}

#[test]
fn bad_entries_are_rejected() {
    let config = Config {
        stations: vec![StationEntry::Shorthand("SRU".to_string())],
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(ArchiveError::InvalidStationId(_))
    );

    let config = Config {
        events: vec![EventEntry {
            name: "e1".to_string(),
            time: TimeValue::Text("sometime".to_string()),
        }],
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(ArchiveError::InvalidTime(_))
    );
}

#[test]
fn inventory_is_keyword_or_path() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("seis-archive.json");
    fs::write(&path, r#"{"fetch": {"method": "dir", "inventory": "IRIS"}}"#).unwrap();
    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.fetch.inventory, Some(InventorySpec::Iris));

    fs::write(
        &path,
        r#"{"fetch": {"inventory": "metadata/stations.xml"}}"#,
    )
    .unwrap();
    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(
        resolved.fetch.inventory,
        Some(InventorySpec::File("metadata/stations.xml".into()))
    );
}

#[test]
fn unknown_method_fails_to_parse() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("custom.json");
    fs::write(&path, r#"{"fetch": {"method": "ftp"}}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(ArchiveError::ConfigParse(_))
    );
}

#[test]
fn explicit_missing_path_is_a_read_error() {
    assert_matches!(
        ConfigLoader::resolve(Some("/definitely/missing/seis-archive.json")),
        Err(ArchiveError::ConfigRead(_))
    );
}

#[test]
fn output_formats_map_to_extensions() {
    let formats = ["mseed", "pickle", "sac", "q"]
        .iter()
        .map(|name| name.parse::<OutputFormat>().unwrap().extension())
        .collect::<Vec<_>>();
    assert_eq!(formats, vec!["msd", "pkl", "sac", "Q"]);
}
