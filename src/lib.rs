pub mod acquire;
pub mod archive;
pub mod backend;
pub mod chunker;
pub mod config;
pub mod domain;
pub mod error;
pub mod fdsn;
pub mod fetcher;
pub mod index;
pub mod index_db;
pub mod layout;
pub mod logging;
pub mod output;
pub mod quality;
pub mod response;
pub mod waveform;
