//! Conversation records.

use serde::{Deserialize, Serialize};

use super::message::{WireMessage, WireParticipant};

/// A conversation as the server sends it.
///
/// In search results `messages` holds minimal hits (id, folder, date); in an
/// expansion response it holds fully fetched messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConversation {
    /// Conversation id.
    #[serde(default)]
    pub id: Option<String>,
    /// Subject.
    #[serde(default, rename = "su")]
    pub subject: Option<String>,
    /// Preview fragment of the latest message.
    #[serde(default, rename = "fr")]
    pub fragment: Option<String>,
    /// Aggregate flag letters.
    #[serde(default, rename = "f")]
    pub flags: Option<String>,
    /// Comma-joined tag ids.
    #[serde(default, rename = "t")]
    pub tag_ids: Option<String>,
    /// Comma-joined tag names.
    #[serde(default, rename = "tn")]
    pub tag_names: Option<String>,
    /// Date of the latest message in milliseconds.
    #[serde(default, rename = "d")]
    pub date: Option<i64>,
    /// Total number of messages on the server.
    #[serde(default, rename = "n")]
    pub message_count: Option<u32>,
    /// Number of unread messages.
    #[serde(default, rename = "u")]
    pub unread_count: Option<u32>,
    /// Aggregate participants.
    #[serde(default, rename = "e")]
    pub participants: Vec<WireParticipant>,
    /// Messages, newest first.
    #[serde(default, rename = "m")]
    pub messages: Vec<WireMessage>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_conversation() {
        let json = r#"{"id":"123","su":"Plans","n":3,"u":1,"f":"u",
            "m":[{"id":"10","l":"2","d":2},{"id":"2","l":"5","d":1}]}"#;
        let conv: WireConversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.id.as_deref(), Some("123"));
        assert_eq!(conv.message_count, Some(3));
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[1].folder_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_conversation_patch() {
        let conv: WireConversation = serde_json::from_str(r#"{"id":"123","n":4}"#).unwrap();
        assert_eq!(conv.message_count, Some(4));
        assert!(conv.messages.is_empty());
        assert!(conv.flags.is_none());
    }
}
