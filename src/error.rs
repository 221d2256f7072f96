//! Error taxonomy for the regression gate
//!
//! Every variant is terminal for the current run. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by measurement aggregation, baseline persistence and analysis
#[derive(Error, Debug)]
pub enum GateError {
    #[error("cannot build a measurement set from zero samples")]
    EmptySampleSet,

    #[error("invalid sample at index {index}: {reason}")]
    InvalidSample { index: usize, reason: String },

    #[error("invalid baseline: {0}")]
    InvalidBaseline(String),

    #[error(
        "no baseline stored for {identity}; record one first with `gpuperf record`"
    )]
    MissingBaseline { identity: String },

    #[error("baseline schema version {found} is not supported (supported: {supported})")]
    IncompatibleSchema { found: String, supported: String },

    #[error("corrupt baseline data in {}: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("{operation} failed for {identity}: {source}")]
    WriteFailure {
        operation: &'static str,
        identity: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sample source returned {actual} samples, expected {expected}")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("statistical test failed: {0}")]
    Statistics(String),
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Coarse error category used by the outcome contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    EmptySampleSet,
    InvalidSample,
    InvalidBaseline,
    MissingBaseline,
    IncompatibleSchema,
    CorruptData,
    WriteFailure,
    SampleCountMismatch,
    InvalidConfig,
    Statistics,
    /// Failure outside the core (sample source, CLI input)
    External,
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::EmptySampleSet => ErrorKind::EmptySampleSet,
            GateError::InvalidSample { .. } => ErrorKind::InvalidSample,
            GateError::InvalidBaseline(_) => ErrorKind::InvalidBaseline,
            GateError::MissingBaseline { .. } => ErrorKind::MissingBaseline,
            GateError::IncompatibleSchema { .. } => ErrorKind::IncompatibleSchema,
            GateError::CorruptData { .. } => ErrorKind::CorruptData,
            GateError::WriteFailure { .. } => ErrorKind::WriteFailure,
            GateError::SampleCountMismatch { .. } => ErrorKind::SampleCountMismatch,
            GateError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            GateError::Statistics(_) => ErrorKind::Statistics,
        }
    }
}
