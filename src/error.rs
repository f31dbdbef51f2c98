//! Error types.
//!
//! Read failures come from host handles and are always contained by the
//! engine. Config errors are the only errors a caller ever sees.

use thiserror::Error;

/// Failure to read a value out of a reactive handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The backing cell was disposed by the host.
    #[error("handle disposed")]
    Disposed,

    /// A computation's getter failed.
    #[error("computation failed: {0}")]
    ComputationFailed(String),

    /// The handle is already being mutated further up the stack.
    #[error("handle is busy")]
    Busy,
}

/// Errors raised while loading or validating [`InspectorConfig`](crate::InspectorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `maxInspectionDepth` must allow at least one level.
    #[error("maxInspectionDepth must be at least 1")]
    InvalidDepth,

    /// `maxStringLength` must allow at least one character.
    #[error("maxStringLength must be at least 1")]
    InvalidStringLength,

    /// `throttleMs` does not fit a signed millisecond duration.
    #[error("throttleMs {0} is out of range")]
    ThrottleOutOfRange(u64),

    /// A component filter pattern was empty.
    #[error("empty component filter pattern in {list}")]
    EmptyPattern {
        /// Which filter list held the pattern
        list: &'static str,
    },

    /// JSON parse error
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
