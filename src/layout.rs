use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{OutputFormat, StationId, to_datetime};
use crate::error::ArchiveError;

pub const CONTINUOUS_DIR_DEFAULT: &str = "ContinuousWaveForms";
pub const EVENT_DIR_DEFAULT: &str = "EventWaveForms";
pub const INDEX_FILE_NAME: &str = ".index.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocation {
    pub dir: Utf8PathBuf,
    pub stem: String,
}

impl ChunkLocation {
    pub fn file_name(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.stem, format.extension())
    }

    pub fn file_path(&self, format: OutputFormat) -> Utf8PathBuf {
        self.dir.join(self.file_name(format))
    }

    pub fn exists(&self) -> bool {
        let Ok(entries) = fs::read_dir(self.dir.as_std_path()) else {
            return false;
        };
        entries.flatten().any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name == self.stem.as_str() || name.starts_with(&format!("{}.", self.stem))
        })
    }
}

// `<root>/<netsta>/<year>/<doy>/<netsta>.<year>-<doy>T<hh>-<mm>-<ss>`
pub fn continuous_location(
    root: &Utf8Path,
    station: &StationId,
    start: f64,
) -> Result<ChunkLocation, ArchiveError> {
    let time = to_datetime(start).ok_or_else(|| ArchiveError::InvalidTime(start.to_string()))?;
    let year = time.format("%Y").to_string();
    let doy = time.format("%j").to_string();
    let netsta = station.to_string();
    let stem = format!("{netsta}.{year}-{doy}T{}", time.format("%H-%M-%S"));
    Ok(ChunkLocation {
        dir: root.join(&netsta).join(&year).join(&doy),
        stem,
    })
}

// `<root>/<event>/<netsta>.<event>`
pub fn event_location(root: &Utf8Path, station: &StationId, event: &str) -> ChunkLocation {
    ChunkLocation {
        dir: root.join(event),
        stem: format!("{station}.{event}"),
    }
}

pub fn index_path(root: &Utf8Path) -> Utf8PathBuf {
    root.join(INDEX_FILE_NAME)
}
