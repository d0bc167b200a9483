// Error types shared by the sequencer core
// Only configuration and persistence boundaries return these; the scheduling
// path recovers locally instead of failing.

use std::path::PathBuf;

/// Failure to parse a musical time notation string
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("empty time notation")]
    Empty,

    #[error("invalid number in time notation '{0}'")]
    InvalidNumber(String),

    #[error("unknown time unit in '{0}'")]
    UnknownUnit(String),

    #[error("invalid transport position '{0}'")]
    InvalidPosition(String),

    #[error("time notation '{0}' resolves to a negative duration")]
    Negative(String),
}

/// Sequencer error types
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported config file '{}'", .0.display())]
    UnsupportedConfigFormat(PathBuf),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SequencerResult<T> = Result<T, SequencerError>;
