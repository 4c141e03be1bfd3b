//! Application-level faults.
//!
//! A fault is the server's structured "no": the transport call itself
//! succeeded, but the body carries a machine-readable code instead of data.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Machine-readable fault code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// The search query could not be parsed.
    QueryParseError,
    /// The referenced conversation does not exist.
    NoSuchConversation,
    /// The referenced message does not exist.
    NoSuchMessage,
    /// The referenced folder does not exist.
    NoSuchFolder,
    /// The caller may not perform the operation.
    PermissionDenied,
    /// The session expired; the host must re-authenticate.
    AuthExpired,
    /// Any other code, kept verbatim.
    Other(String),
}

impl FaultCode {
    /// Parses a wire fault code.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "mail.QUERY_PARSE_ERROR" => Self::QueryParseError,
            "mail.NO_SUCH_CONV" => Self::NoSuchConversation,
            "mail.NO_SUCH_MSG" => Self::NoSuchMessage,
            "mail.NO_SUCH_FOLDER" => Self::NoSuchFolder,
            "service.PERM_DENIED" => Self::PermissionDenied,
            "service.AUTH_EXPIRED" => Self::AuthExpired,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::QueryParseError => "mail.QUERY_PARSE_ERROR",
            Self::NoSuchConversation => "mail.NO_SUCH_CONV",
            Self::NoSuchMessage => "mail.NO_SUCH_MSG",
            Self::NoSuchFolder => "mail.NO_SUCH_FOLDER",
            Self::PermissionDenied => "service.PERM_DENIED",
            Self::AuthExpired => "service.AUTH_EXPIRED",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for FaultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FaultCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A structured fault returned inside a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Machine-readable code.
    pub code: FaultCode,
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
}

impl Fault {
    /// Creates a new fault.
    #[must_use]
    pub fn new(code: FaultCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Returns true if this is a query parse error.
    #[must_use]
    pub fn is_query_parse_error(&self) -> bool {
        self.code == FaultCode::QueryParseError
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.reason)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_codes() {
        assert_eq!(
            FaultCode::parse("mail.QUERY_PARSE_ERROR"),
            FaultCode::QueryParseError
        );
        assert_eq!(
            FaultCode::parse("mail.NO_SUCH_CONV"),
            FaultCode::NoSuchConversation
        );
        assert_eq!(
            FaultCode::parse("mail.TOO_MANY_TAGS"),
            FaultCode::Other("mail.TOO_MANY_TAGS".into())
        );
    }

    #[test]
    fn test_fault_from_json() {
        let fault: Fault =
            serde_json::from_str(r#"{"code":"mail.QUERY_PARSE_ERROR","reason":"near ("}"#)
                .unwrap();
        assert!(fault.is_query_parse_error());
        assert_eq!(fault.to_string(), "mail.QUERY_PARSE_ERROR: near (");
    }

    #[test]
    fn test_fault_without_reason() {
        let fault: Fault = serde_json::from_str(r#"{"code":"service.PERM_DENIED"}"#).unwrap();
        assert_eq!(fault.code, FaultCode::PermissionDenied);
        assert_eq!(fault.to_string(), "service.PERM_DENIED");
    }
}
