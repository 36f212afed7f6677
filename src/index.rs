use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::ArchiveError;
use crate::logging::LogSink;
use crate::waveform::{Stream, WaveformCodec};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    pub path: Vec<usize>,
    pub file_name: String,
    pub starttime: f64,
    pub endtime: f64,
    pub gaps: f64,
    pub channel_count: usize,
    pub trace_count: usize,
    pub duration: f64,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkQuality {
    pub starttime: f64,
    pub endtime: f64,
    pub gaps: f64,
    pub channel_count: usize,
    pub trace_count: usize,
    pub duration: f64,
    pub station: String,
}

impl ChunkQuality {
    pub fn from_stream(stream: &Stream) -> Option<Self> {
        let first = stream.traces().first()?;
        let starttime = stream.starttime()?;
        let endtime = stream.endtime()?;
        Some(Self {
            starttime,
            endtime,
            gaps: stream.gap_seconds(),
            channel_count: stream.channel_count(),
            trace_count: stream.len(),
            duration: endtime - starttime,
            station: first.netsta(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathComponentTable {
    levels: Vec<Vec<String>>,
    lookup: Vec<HashMap<String, usize>>,
}

impl PathComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(levels: Vec<Vec<String>>) -> Self {
        let lookup = levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .enumerate()
                    .map(|(idx, segment)| (segment.clone(), idx))
                    .collect()
            })
            .collect();
        Self { levels, lookup }
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn encode(&mut self, segments: &[String]) -> Vec<usize> {
        while self.levels.len() < segments.len() {
            self.levels.push(Vec::new());
            self.lookup.push(HashMap::new());
        }
        segments
            .iter()
            .enumerate()
            .map(|(depth, segment)| {
                if let Some(idx) = self.lookup[depth].get(segment) {
                    return *idx;
                }
                let idx = self.levels[depth].len();
                self.levels[depth].push(segment.clone());
                self.lookup[depth].insert(segment.clone(), idx);
                idx
            })
            .collect()
    }

    pub fn decode(&self, indices: &[usize]) -> Result<Utf8PathBuf, ArchiveError> {
        let mut path = Utf8PathBuf::new();
        for (depth, idx) in indices.iter().enumerate() {
            let segment = self
                .levels
                .get(depth)
                .and_then(|level| level.get(*idx))
                .ok_or_else(|| {
                    ArchiveError::IndexDb(format!(
                        "path component {idx} at depth {depth} missing from indkey"
                    ))
                })?;
            path.push(segment);
        }
        Ok(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexTables {
    pub records: Vec<ChunkRecord>,
    pub components: PathComponentTable,
}

impl IndexTables {
    pub fn relative_path(&self, record: &ChunkRecord) -> Result<Utf8PathBuf, ArchiveError> {
        Ok(self.components.decode(&record.path)?.join(&record.file_name))
    }
}

pub fn scan(
    root: &Utf8Path,
    codec: &dyn WaveformCodec,
    sink: &dyn LogSink,
) -> Result<IndexTables, ArchiveError> {
    let mut tables = IndexTables::default();

    for entry in WalkDir::new(root.as_std_path()).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                sink.warn(format!("cannot walk {err}, skipping"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path().to_path_buf()) else {
            sink.warn(format!("non-utf8 path {}, skipping", entry.path().display()));
            continue;
        };
        let relative = path
            .strip_prefix(root)
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;

        let quality = match codec.read(&path) {
            Ok(stream) => ChunkQuality::from_stream(&stream),
            Err(err) => {
                sink.warn(format!("failed to read {path}, skipping: {err}"));
                continue;
            }
        };
        let Some(quality) = quality else {
            sink.warn(format!("{path} holds no traces, skipping"));
            continue;
        };

        let segments = relative
            .parent()
            .map(|parent| parent.iter().map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let file_name = relative.file_name().unwrap_or_default().to_string();
        tables.records.push(ChunkRecord {
            path: tables.components.encode(&segments),
            file_name,
            starttime: quality.starttime,
            endtime: quality.endtime,
            gaps: quality.gaps,
            channel_count: quality.channel_count,
            trace_count: quality.trace_count,
            duration: quality.duration,
            station: quality.station,
        });
    }

    if tables.records.is_empty() {
        return Err(ArchiveError::NoReadableFiles(root.to_path_buf()));
    }
    Ok(tables)
}
