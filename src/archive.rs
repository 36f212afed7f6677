use std::collections::BTreeSet;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::index::{self, ChunkRecord};
use crate::index_db::IndexDb;
use crate::layout;
use crate::logging::LogSink;
use crate::waveform::WaveformCodec;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryTolerance {
    pub overlap_fraction: f64,
    pub load_buffer: f64,
}

impl Default for QueryTolerance {
    fn default() -> Self {
        Self {
            overlap_fraction: 0.1,
            load_buffer: 3.0 * 3600.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub root: String,
    pub records: usize,
    pub stations: Vec<String>,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub path: String,
    pub station: String,
    pub starttime: f64,
    pub endtime: f64,
    pub gaps: f64,
    pub channel_count: usize,
    pub trace_count: usize,
    pub duration: f64,
}

#[derive(Clone)]
pub struct Archive {
    root: Utf8PathBuf,
    codec: Option<Arc<dyn WaveformCodec>>,
    tolerance: QueryTolerance,
}

impl Archive {
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        if !root.as_std_path().is_dir() {
            return Err(ArchiveError::DirectoryNotFound(root));
        }
        Ok(Self {
            root,
            codec: None,
            tolerance: QueryTolerance::default(),
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn WaveformCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_tolerance(mut self, tolerance: QueryTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn codec(&self) -> Option<&Arc<dyn WaveformCodec>> {
        self.codec.as_ref()
    }

    pub fn index_path(&self) -> Utf8PathBuf {
        layout::index_path(&self.root)
    }

    pub fn is_indexed(&self) -> bool {
        self.index_path().as_std_path().is_file()
    }

    pub fn index(&self, sink: &dyn LogSink) -> Result<IndexSummary, ArchiveError> {
        let codec = self
            .codec
            .as_deref()
            .ok_or_else(|| ArchiveError::NotIndexed(self.root.clone()))?;
        sink.info(format!("indexing {}", self.root));
        let tables = index::scan(&self.root, codec, sink)?;
        IndexDb::write(&self.index_path(), &tables)?;

        let stations = tables
            .records
            .iter()
            .map(|record| record.station.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        sink.info(format!(
            "indexed {} files for {} stations in {}",
            tables.records.len(),
            stations.len(),
            self.root
        ));
        Ok(IndexSummary {
            root: self.root.to_string(),
            records: tables.records.len(),
            stations,
            depth: tables.components.depth(),
        })
    }

    pub fn query(
        &self,
        station: &str,
        t1: f64,
        t2: f64,
        sink: &dyn LogSink,
    ) -> Result<Option<Vec<Utf8PathBuf>>, ArchiveError> {
        let db = self.open_index(sink)?;
        let buffer = self.tolerance.load_buffer;
        let loaded = db.load_range(station, t1 - buffer, t2 + buffer)?;
        let mut kept = loaded
            .into_iter()
            .filter(|record| retained(record, t1, t2, self.tolerance.overlap_fraction))
            .collect::<Vec<_>>();
        if kept.is_empty() {
            return Ok(None);
        }
        kept.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let components = db.load_components()?;
        kept.iter()
            .map(|record| {
                Ok(self
                    .root
                    .join(components.decode(&record.path)?)
                    .join(&record.file_name))
            })
            .collect::<Result<Vec<_>, ArchiveError>>()
            .map(Some)
    }

    pub fn entries(
        &self,
        station: Option<&str>,
        sink: &dyn LogSink,
    ) -> Result<Vec<IndexEntry>, ArchiveError> {
        let db = self.open_index(sink)?;
        let components = db.load_components()?;
        db.load_all(station)?
            .into_iter()
            .map(|record| {
                let path = self
                    .root
                    .join(components.decode(&record.path)?)
                    .join(&record.file_name);
                Ok(IndexEntry {
                    path: path.to_string(),
                    station: record.station,
                    starttime: record.starttime,
                    endtime: record.endtime,
                    gaps: record.gaps,
                    channel_count: record.channel_count,
                    trace_count: record.trace_count,
                    duration: record.duration,
                })
            })
            .collect()
    }

    fn open_index(&self, sink: &dyn LogSink) -> Result<IndexDb, ArchiveError> {
        if !self.is_indexed() {
            if self.codec.is_none() {
                return Err(ArchiveError::NotIndexed(self.root.clone()));
            }
            sink.info(format!("{} is not currently indexed, indexing now", self.root));
            self.index(sink)?;
        }
        IndexDb::open(&self.index_path())
    }
}

// A record is dropped only when it lies almost entirely on one side of
// `[t1, t2]`, i.e. it overlaps the window by less than `fraction` of the
// window length at one edge without reaching past the other edge.
pub fn retained(record: &ChunkRecord, t1: f64, t2: f64, fraction: f64) -> bool {
    let tolerance = (t2 - t1) * fraction;
    let (start, end) = (record.starttime, record.endtime);
    let before = start <= t1 && end - tolerance < t1 && start < t2 && end < t2;
    let after = start > t1 && end > t1 && start + tolerance > t2 && end >= t2;
    !(before || after)
}
