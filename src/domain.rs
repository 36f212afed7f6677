use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId {
    network: String,
    station: String,
}

impl StationId {
    pub fn new(network: &str, station: &str) -> Result<Self, ArchiveError> {
        let network = network.trim().to_string();
        let station = station.trim().to_string();
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        };
        if !valid(&network) || !valid(&station) {
            return Err(ArchiveError::InvalidStationId(format!("{network}.{station}")));
        }
        Ok(Self { network, station })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.network, self.station)
    }
}

impl FromStr for StationId {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (network, station) = value
            .trim()
            .split_once('.')
            .ok_or_else(|| ArchiveError::InvalidStationId(value.to_string()))?;
        if station.contains('.') {
            return Err(ArchiveError::InvalidStationId(value.to_string()));
        }
        Self::new(network, station)
    }
}

pub fn parse_channels(value: &str) -> Result<Vec<String>, ArchiveError> {
    let channels = value
        .split('-')
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>();
    if channels.is_empty() {
        return Err(ArchiveError::InvalidChannels(value.to_string()));
    }
    Ok(channels)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationKey {
    pub id: StationId,
    pub channels: Vec<String>,
    pub location: String,
    pub starttime: Option<f64>,
    pub endtime: Option<f64>,
}

impl StationKey {
    pub fn new(id: StationId, channels: Vec<String>) -> Self {
        Self {
            id,
            channels,
            location: "*".to_string(),
            starttime: None,
            endtime: None,
        }
    }

    pub fn with_range(mut self, starttime: f64, endtime: f64) -> Self {
        self.starttime = Some(starttime);
        self.endtime = Some(endtime);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventKey {
    pub name: String,
    pub origin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationRequest {
    pub network: String,
    pub station: String,
    pub channels: Vec<String>,
    pub location: String,
    pub start: f64,
    pub end: f64,
}

impl StationRequest {
    pub fn new(id: &StationId, channels: &[String], location: &str, window: TimeWindow) -> Self {
        Self {
            network: id.network().to_string(),
            station: id.station().to_string(),
            channels: channels.to_vec(),
            location: location.to_string(),
            start: window.start,
            end: window.end,
        }
    }

    pub fn netsta(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Result<Self, ArchiveError> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(ArchiveError::InvalidWindow(format!("{start} to {end}")));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", format_time(self.start), format_time(self.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mseed,
    Pickle,
    Sac,
    Q,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mseed => "msd",
            OutputFormat::Pickle => "pkl",
            OutputFormat::Sac => "sac",
            OutputFormat::Q => "Q",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Mseed => write!(f, "mseed"),
            OutputFormat::Pickle => write!(f, "pickle"),
            OutputFormat::Sac => write!(f, "sac"),
            OutputFormat::Q => write!(f, "q"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mseed" => Ok(OutputFormat::Mseed),
            "pickle" => Ok(OutputFormat::Pickle),
            "sac" => Ok(OutputFormat::Sac),
            "q" => Ok(OutputFormat::Q),
            _ => Err(ArchiveError::UnsupportedFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputType {
    Disp,
    Vel,
    Acc,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Disp => write!(f, "DISP"),
            OutputType::Vel => write!(f, "VEL"),
            OutputType::Acc => write!(f, "ACC"),
        }
    }
}

impl FromStr for OutputType {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "DISP" | "DISPLACEMENT" => Ok(OutputType::Disp),
            "VEL" | "VELOCITY" => Ok(OutputType::Vel),
            "ACC" | "ACCELERATION" => Ok(OutputType::Acc),
            _ => Err(ArchiveError::InvalidOutputType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreFilter(pub [f64; 4]);

impl PreFilter {
    pub fn validate(&self) -> Result<(), ArchiveError> {
        let [f1, f2, f3, f4] = self.0;
        if f1 < 0.0 || !(f1 < f2 && f2 < f3 && f3 < f4) {
            return Err(ArchiveError::Configuration(format!(
                "pre-filter corners must be increasing, got {:?}",
                self.0
            )));
        }
        Ok(())
    }
}

impl Default for PreFilter {
    fn default() -> Self {
        Self([0.05, 0.1, 15.0, 20.0])
    }
}

pub fn parse_time(value: &str) -> Result<f64, ArchiveError> {
    let trimmed = value.trim();
    if let Ok(epoch) = trimmed.parse::<f64>() {
        if epoch.is_finite() {
            return Ok(epoch);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(epoch_of(&parsed.with_timezone(&Utc)));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(epoch_of(&naive.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(epoch_of(&naive.and_utc()));
        }
    }
    Err(ArchiveError::InvalidTime(value.to_string()))
}

pub fn to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

pub fn format_time(epoch: f64) -> String {
    to_datetime(epoch)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

fn epoch_of(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}
