//! Error types for the sync engine.

use mailmirror_wire::Fault;
use thiserror::Error;

/// Errors that can occur in engine operations.
///
/// Data-shape problems never show up here. Malformed records are normalized
/// with defaults and malformed delta entries are skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed to deliver a request.
    #[error("Wire error: {0}")]
    Wire(#[from] mailmirror_wire::Error),

    /// The server could not parse the query.
    #[error("Invalid query: {0}")]
    InvalidQuery(Fault),

    /// The server rejected the request with a structured fault.
    #[error("Server fault: {0}")]
    Fault(Fault),

    /// A load-more is already outstanding for the current query.
    #[error("A page load is already in flight")]
    LoadInFlight,

    /// There is no query to page through or resync.
    #[error("No active query")]
    NoActiveQuery,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Classifies a fault returned by the server.
    #[must_use]
    pub fn from_fault(fault: Fault) -> Self {
        if fault.is_query_parse_error() {
            Self::InvalidQuery(fault)
        } else {
            Self::Fault(fault)
        }
    }

    /// Returns the structured fault if this error carries one.
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::InvalidQuery(fault) | Self::Fault(fault) => Some(fault),
            Self::Wire(err) => err.fault(),
            _ => None,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Wire(err) => err.is_retryable(),
            Self::LoadInFlight => true,
            _ => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailmirror_wire::FaultCode;

    use super::*;

    #[test]
    fn test_from_fault_classifies_parse_errors() {
        let err = Error::from_fault(Fault::new(FaultCode::QueryParseError, "unbalanced"));
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = Error::from_fault(Fault::new(FaultCode::PermissionDenied, ""));
        assert!(matches!(err, Error::Fault(_)));
        assert_eq!(err.fault().unwrap().code, FaultCode::PermissionDenied);
    }

    #[test]
    fn test_wire_fault_is_visible() {
        let err = Error::from(mailmirror_wire::Error::Fault(Fault::new(
            FaultCode::NoSuchMessage,
            "",
        )));
        assert_eq!(err.fault().unwrap().code, FaultCode::NoSuchMessage);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transport_is_retryable() {
        let err = Error::from(mailmirror_wire::Error::Transport("reset".into()));
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("Wire error"));
    }
}
