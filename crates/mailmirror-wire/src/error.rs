//! Error types for the wire layer.

use std::time::Duration;

use thiserror::Error;

use crate::fault::Fault;

/// Errors a transport can report back to the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (network down, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the request with a structured fault.
    #[error("Server fault: {0}")]
    Fault(Fault),

    /// A payload could not be decoded at all.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Returns the structured fault if this error carries one.
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Faults are answers from the server and are not retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
