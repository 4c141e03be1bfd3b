//! Push notification records.

use serde::{Deserialize, Serialize};

use super::conversation::WireConversation;
use super::message::WireMessage;

/// One notification batch from the push feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNotify {
    /// Monotonically increasing sequence number.
    #[serde(default)]
    pub seq: Option<u64>,
    /// Mailbox-state counter after this batch.
    #[serde(default)]
    pub change: Option<u64>,
    /// Newly created entities.
    #[serde(default)]
    pub created: WireCreated,
    /// Partial patches for existing entities.
    #[serde(default)]
    pub modified: WireModified,
    /// Deleted ids.
    #[serde(default)]
    pub deleted: WireDeleted,
}

impl WireNotify {
    /// Creates an empty batch with the given sequence number.
    #[must_use]
    pub fn new(seq: u64) -> Self {
        Self {
            seq: Some(seq),
            ..Self::default()
        }
    }

    /// Sets the mailbox-state counter.
    #[must_use]
    pub const fn with_change(mut self, change: u64) -> Self {
        self.change = Some(change);
        self
    }

    /// Returns true if the batch carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.messages.is_empty()
            && self.created.conversations.is_empty()
            && self.modified.messages.is_empty()
            && self.modified.conversations.is_empty()
            && self.deleted.ids.as_deref().is_none_or(str::is_empty)
    }
}

/// Created entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCreated {
    /// Created messages.
    #[serde(default, rename = "m")]
    pub messages: Vec<WireMessage>,
    /// Created conversations.
    #[serde(default, rename = "c")]
    pub conversations: Vec<WireConversation>,
}

/// Modified entities, carrying only the changed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireModified {
    /// Message patches.
    #[serde(default, rename = "m")]
    pub messages: Vec<WireMessage>,
    /// Conversation patches.
    #[serde(default, rename = "c")]
    pub conversations: Vec<WireConversation>,
}

/// Deleted ids, for either messages or conversations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDeleted {
    /// Comma-joined id list.
    #[serde(default, rename = "id")]
    pub ids: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_notify() {
        let json = r#"{"seq":7,"change":1042,
            "created":{"m":[{"id":"300","l":"2","cid":"-300"}]},
            "modified":{"m":[{"id":"10","f":""}],"c":[{"id":"123","u":0}]},
            "deleted":{"id":"11,12"}}"#;
        let notify: WireNotify = serde_json::from_str(json).unwrap();
        assert_eq!(notify.seq, Some(7));
        assert_eq!(notify.change, Some(1042));
        assert_eq!(notify.created.messages.len(), 1);
        assert_eq!(notify.modified.conversations[0].unread_count, Some(0));
        assert_eq!(notify.deleted.ids.as_deref(), Some("11,12"));
        assert!(!notify.is_empty());
    }

    #[test]
    fn test_empty_notify() {
        let notify: WireNotify = serde_json::from_str(r#"{"seq":1}"#).unwrap();
        assert!(notify.is_empty());
        assert_eq!(notify, WireNotify::new(1));
    }
}
