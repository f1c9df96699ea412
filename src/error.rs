//! Error taxonomy for the engine.
//!
//! Only genuine failures live here. The outcomes of a single test execution
//! (overrun, invalid, interesting) are statuses on `ConjectureData`, and the
//! control-flow signal that unwinds a test function back to the runner is
//! the zero-sized [`StopTest`](crate::data::StopTest).

use crate::codec::CodecError;
use crate::database::DatabaseError;

/// Type alias for engine operation results
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine's components
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A component was used outside of its contract, e.g. an alias sampler
    /// built from weights that are all zero.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A decode invariant was violated. This is an internal bug.
    #[error("Malformed buffer: {0}")]
    MalformedBuffer(String),

    /// A decode ran past the end of its buffer.
    #[error("Buffer overrun at offset {offset}: needed {needed} bytes, {available} available")]
    Overrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<CodecError> for EngineError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Overrun {
                offset,
                needed,
                available,
            } => EngineError::Overrun {
                offset,
                needed,
                available,
            },
            CodecError::MalformedBuffer { remaining } => EngineError::MalformedBuffer(format!(
                "{} unconsumed bytes remain after decoding",
                remaining
            )),
            CodecError::FormatMismatch { expected, actual } => EngineError::InvalidArgument(
                format!("format expects {} values but {} were supplied", expected, actual),
            ),
            CodecError::ValueMismatch { index, field } => EngineError::InvalidArgument(format!(
                "value {} does not fit field {:?}",
                index, field
            )),
        }
    }
}
