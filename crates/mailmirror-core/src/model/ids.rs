//! Entity identifiers.
//!
//! Server ids are opaque strings. Conversation ids can be negative numbers
//! for single-message virtual conversations, so nothing here parses them.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates an id from a string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Message id.
    MessageId
);

string_id!(
    /// Conversation id.
    ConversationId
);

string_id!(
    /// Folder id.
    ///
    /// The server uses small numeric ids for system folders (`"2"` is the
    /// inbox, `"3"` the trash, `"4"` junk).
    FolderId
);

string_id!(
    /// Tag id.
    TagId
);

impl FolderId {
    /// Well-known inbox folder id.
    pub const INBOX: &'static str = "2";
    /// Well-known trash folder id.
    pub const TRASH: &'static str = "3";
    /// Well-known junk folder id.
    pub const JUNK: &'static str = "4";
    /// Well-known sent folder id.
    pub const SENT: &'static str = "5";
    /// Well-known drafts folder id.
    pub const DRAFTS: &'static str = "6";

    /// Returns the inbox folder id.
    #[must_use]
    pub fn inbox() -> Self {
        Self::new(Self::INBOX)
    }

    /// Returns the trash folder id.
    #[must_use]
    pub fn trash() -> Self {
        Self::new(Self::TRASH)
    }

    /// Returns the junk folder id.
    #[must_use]
    pub fn junk() -> Self {
        Self::new(Self::JUNK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_conversion() {
        let id = ConversationId::from("-257");
        assert_eq!(id.as_str(), "-257");
        assert_eq!(id.to_string(), "-257");
        assert_eq!(MessageId::from(String::from("10")), MessageId::new("10"));
    }

    #[test]
    fn test_well_known_folders() {
        assert_eq!(FolderId::inbox().as_str(), "2");
        assert_eq!(FolderId::trash().as_str(), "3");
        assert_eq!(FolderId::junk().as_str(), "4");
    }
}
