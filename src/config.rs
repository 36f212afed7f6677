use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{EventKey, StationId, StationKey, parse_channels, parse_time};
use crate::error::ArchiveError;
use crate::fetcher::FetcherConfig;

pub const CONFIG_FILE_NAME: &str = "seis-archive.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetcherConfig,
    #[serde(default)]
    pub stations: Vec<StationEntry>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StationEntry {
    Shorthand(String),
    Detailed(StationEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StationEntryObject {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub channels: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starttime: Option<TimeValue>,
    #[serde(default)]
    pub endtime: Option<TimeValue>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EventEntry {
    pub name: String,
    pub time: TimeValue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimeValue {
    Epoch(f64),
    Text(String),
}

impl TimeValue {
    pub fn resolve(&self) -> Result<f64, ArchiveError> {
        match self {
            TimeValue::Epoch(value) if value.is_finite() => Ok(*value),
            TimeValue::Epoch(value) => Err(ArchiveError::InvalidTime(value.to_string())),
            TimeValue::Text(value) => parse_time(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub fetch: FetcherConfig,
    pub stations: Vec<StationKey>,
    pub events: Vec<EventKey>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ArchiveError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ArchiveError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ArchiveError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ArchiveError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ArchiveError> {
        config.fetch.pre_filter.validate()?;

        let stations = config
            .stations
            .into_iter()
            .map(|entry| match entry {
                StationEntry::Shorthand(value) => {
                    Ok(StationKey::new(value.parse()?, default_channels()))
                }
                StationEntry::Detailed(obj) => {
                    let id = StationId::new(&obj.network, &obj.station)?;
                    let channels = match obj.channels.as_deref() {
                        Some(channels) => parse_channels(channels)?,
                        None => default_channels(),
                    };
                    let mut key = StationKey::new(id, channels);
                    if let Some(location) = obj.location {
                        key.location = location;
                    }
                    key.starttime = obj.starttime.as_ref().map(TimeValue::resolve).transpose()?;
                    key.endtime = obj.endtime.as_ref().map(TimeValue::resolve).transpose()?;
                    Ok(key)
                }
            })
            .collect::<Result<Vec<_>, ArchiveError>>()?;

        let events = config
            .events
            .into_iter()
            .map(|entry| {
                let name = entry.name.trim().to_string();
                if name.is_empty() {
                    return Err(ArchiveError::ConfigParse("event with empty name".to_string()));
                }
                Ok(EventKey {
                    name,
                    origin: entry.time.resolve()?,
                })
            })
            .collect::<Result<Vec<_>, ArchiveError>>()?;

        Ok(ResolvedConfig {
            fetch: config.fetch,
            stations,
            events,
        })
    }
}

pub fn default_channels() -> Vec<String> {
    vec!["*".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            stations: vec![StationEntry::Shorthand("UU.SRU".to_string())],
            events: vec![EventEntry {
                name: "2007-08-06".to_string(),
                time: TimeValue::Epoch(1_186_400_000.0),
            }],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.stations.len(), 1);
        assert_eq!(resolved.stations[0].id.to_string(), "UU.SRU");
        assert_eq!(resolved.stations[0].channels, default_channels());
        assert_eq!(resolved.stations[0].location, "*");
        assert_eq!(resolved.events[0].origin, 1_186_400_000.0);
        assert_eq!(resolved.fetch, FetcherConfig::default());
    }
}
