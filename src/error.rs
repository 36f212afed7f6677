use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("invalid station id (expected NETWORK.STATION): {0}")]
    InvalidStationId(String),

    #[error("invalid channel list: {0}")]
    InvalidChannels(String),

    #[error("invalid time value: {0}")]
    InvalidTime(String),

    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    #[error("fetch method {0} not supported, options are dir, client, iris, uuss")]
    InvalidMethod(String),

    #[error("{0} is not an acceptable format, choices are mseed, pickle, sac, q")]
    UnsupportedFormat(String),

    #[error("invalid response output type: {0}")]
    InvalidOutputType(String),

    #[error("{0}")]
    Configuration(String),

    #[error("directory {0} not found, make sure the path is correct")]
    DirectoryNotFound(Utf8PathBuf),

    #[error("missing config file seis-archive.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no readable waveform files found in {0}")]
    NoReadableFiles(Utf8PathBuf),

    #[error("{0} is not indexed and no waveform codec is available to index it")]
    NotIndexed(Utf8PathBuf),

    #[error(
        "{segments} distinct directory names at depth {depth} exceed the index limit of {limit}"
    )]
    TooManyPathSegments {
        depth: usize,
        segments: usize,
        limit: usize,
    },

    #[error("index database error: {0}")]
    IndexDb(String),

    #[error("failed to decode waveform data: {0}")]
    Decode(String),

    #[error("failed to write waveform data: {0}")]
    Encode(String),

    #[error("waveform request failed: {0}")]
    Transport(String),

    #[error("waveform service returned status {status}: {message}")]
    TransportStatus { status: u16, message: String },

    #[error("inventory request failed: {0}")]
    Inventory(String),

    #[error("response removal failed: {0}")]
    ResponseRemoval(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
