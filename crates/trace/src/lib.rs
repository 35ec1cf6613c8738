//! Trace reading and configuration loading for the Aladdin datapath engine
//! (spec.md §4.1, §6). This crate is the "configuration provider" the core
//! consumes; it owns no scheduling or rewriting logic of its own.

pub mod builder;
pub mod config;
pub mod error;
pub mod opcode;
pub mod record;

pub use builder::DddgBuilder;
pub use config::{Config, LoopRef, PartitionSpec};
pub use error::{ConfigError, TraceError};

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open a gzip-compressed trace file and build the initial DDDG from it
/// (§4.1). Plain (non-gzipped) trace files are also accepted, the way
/// `flate2::read::GzDecoder` happily round-trips through a BufReader
/// regardless of whether the magic bytes are present is *not* assumed here
/// — callers with an uncompressed trace should use
/// [`DddgBuilder::build_from_reader`] directly.
pub fn build_from_gzip_path(path: &Path) -> anyhow::Result<DddgBuilder> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let reader = BufReader::new(decoder);
    Ok(DddgBuilder::new().build_from_reader(reader)?)
}

pub fn load_config_path(path: &Path) -> Result<Config, ConfigError> {
    let file = File::open(path)?;
    Config::parse(BufReader::new(file))
}

/// Build a DDDG from an in-memory trace string (used by tests and by
/// callers that already have the trace decompressed).
pub fn build_from_str(trace: &str) -> Result<DddgBuilder, TraceError> {
    DddgBuilder::new().build_from_reader(std::io::Cursor::new(trace.as_bytes()))
}
