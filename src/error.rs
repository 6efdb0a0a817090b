//! Error taxonomy for the movement engine.
//!
//! Invariant violations (double-incref of a blocker, popping an empty
//! flock, scheduler misuse) are programmer errors, not caller errors: they
//! are asserted, not returned as `Err`. [`MovementError`] covers the kinds
//! that a caller can legitimately hit and recover from.

use thiserror::Error;

/// Errors surfaced by the public engine API.
#[derive(Debug, Error)]
pub enum MovementError {
    /// A backing container could not grow to hold a new entry. The
    /// operation that triggered this is aborted atomically; engine state
    /// is left exactly as if the call had not been made.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Saved state did not deserialize into a consistent engine: a type
    /// tag or id lookup failed. The load is aborted and any flocks
    /// constructed so far during the failed load are discarded.
    #[error("failed to deserialize engine state: {0}")]
    Deserialize(String),

    /// Configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// Configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Box<bincode::ErrorKind>> for MovementError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        MovementError::Deserialize(e.to_string())
    }
}

pub type MovementResult<T> = Result<T, MovementError>;
