use std::io::{self, Write};

use serde::Serialize;

use crate::acquire::PlannedChunk;
use crate::archive::IndexEntry;

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub station: String,
    pub starttime: f64,
    pub endtime: f64,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunksResult {
    pub duration: f64,
    pub starts: Vec<f64>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_query(result: &QueryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_records(records: &[IndexEntry]) -> io::Result<()> {
        Self::print_json(&records)
    }

    pub fn print_chunks(result: &ChunksResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_plan(plan: &[PlannedChunk]) -> io::Result<()> {
        Self::print_json(&plan)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
