//! logminer: a toolkit for turning raw text log files into a structured
//! event stream.
//!
//! Each log line is split by a declared format into header fields plus a
//! free-text content field, then assigned to an event template either by
//! matching against manually curated regex templates or by Drain-style
//! discovery. A grid-search tuner sweeps a backend's numeric knobs and
//! scores every configuration against a hand-labeled ground truth.

pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod format;
pub mod grid;
pub mod matcher;
pub mod miner;
pub mod parser;
pub mod template;
pub mod tuner;

pub use config::MinerConfig;
pub use error::{Error, Result};
pub use miner::DataMiner;
pub use parser::{build_parser, LogParser, Method, ParseArtifacts, ParserConfig};
pub use tuner::ParserTuner;
