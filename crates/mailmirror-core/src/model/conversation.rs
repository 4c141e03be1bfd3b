//! Conversation model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, FolderId, MessageId, TagId};
use super::message::Participant;

/// Minimal per-message data held by a conversation.
///
/// Full messages live in the store's message map; this is only what a list
/// row needs before the conversation is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Message id.
    pub id: MessageId,
    /// Folder the message sits in.
    pub folder_id: FolderId,
    /// Date.
    pub date: Option<DateTime<Utc>>,
}

/// A normalized conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Subject.
    pub subject: String,
    /// Preview fragment of the latest message.
    pub fragment: String,
    /// Date of the latest message.
    pub date: Option<DateTime<Utc>>,
    /// Aggregate participants.
    pub participants: Vec<Participant>,
    /// Known messages, in server order.
    pub messages: Vec<ConversationMessage>,
    /// Server-side message count; may exceed `messages.len()`.
    pub messages_in_conversation: u32,
    /// Whether every message is read.
    pub read: bool,
    /// Whether any message is flagged.
    pub flagged: bool,
    /// Number of unread messages.
    pub unread_count: u32,
    /// Tags.
    pub tags: Vec<TagId>,
}

impl Conversation {
    /// Returns the message ids in order.
    #[must_use]
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.messages.iter().map(|m| m.id.clone()).collect()
    }

    /// Returns true if the conversation lists the message.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// Returns true if both conversations list the same message ids.
    #[must_use]
    pub fn same_messages(&self, other: &Self) -> bool {
        self.messages.len() == other.messages.len()
            && self
                .messages
                .iter()
                .zip(&other.messages)
                .all(|(a, b)| a.id == b.id)
    }

    /// Removes a message from the summary list.
    ///
    /// Returns true if it was listed. The server count drops with it.
    pub fn remove_message(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| &m.id != id);
        let removed = self.messages.len() != before;
        if removed {
            self.messages_in_conversation = self.messages_in_conversation.saturating_sub(1);
        }
        removed
    }

    /// Adds a message at the front of the summary list, newest first.
    pub fn push_front(&mut self, message: ConversationMessage) {
        if self.contains(&message.id) {
            return;
        }
        self.messages.insert(0, message);
        let listed = u32::try_from(self.messages.len()).unwrap_or(u32::MAX);
        self.messages_in_conversation = (self.messages_in_conversation + 1).max(listed);
    }

    /// Merges a freshly normalized record into this one.
    ///
    /// The message list is taken only when `incoming` lists messages.
    pub fn merge(&mut self, incoming: Self) {
        if !incoming.subject.is_empty() {
            self.subject = incoming.subject;
        }
        if !incoming.fragment.is_empty() {
            self.fragment = incoming.fragment;
        }
        if incoming.date.is_some() {
            self.date = incoming.date;
        }
        if !incoming.participants.is_empty() {
            self.participants = incoming.participants;
        }
        if !incoming.messages.is_empty() {
            self.messages = incoming.messages;
        }
        self.messages_in_conversation = incoming.messages_in_conversation;
        self.read = incoming.read;
        self.flagged = incoming.flagged;
        self.unread_count = incoming.unread_count;
        self.tags = incoming.tags;
    }

    /// Applies a partial patch. Returns true if any field changed.
    pub fn apply_patch(&mut self, patch: &ConversationPatch) -> bool {
        let before = self.clone();
        if let Some(subject) = &patch.subject {
            self.subject.clone_from(subject);
        }
        if let Some(fragment) = &patch.fragment {
            self.fragment.clone_from(fragment);
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
        if let Some(read) = patch.read {
            self.read = read;
            if read {
                self.unread_count = 0;
            }
        }
        if let Some(flagged) = patch.flagged {
            self.flagged = flagged;
        }
        if let Some(unread_count) = patch.unread_count {
            self.unread_count = unread_count;
            self.read = unread_count == 0;
        }
        if let Some(count) = patch.messages_in_conversation {
            self.messages_in_conversation = count;
        }
        if let Some(tags) = &patch.tags {
            self.tags.clone_from(tags);
        }
        *self != before
    }

    /// Captures the current values of the fields `patch` would touch.
    #[must_use]
    pub fn snapshot_for(&self, patch: &ConversationPatch) -> ConversationPatch {
        ConversationPatch {
            id: self.id.clone(),
            subject: patch.subject.as_ref().map(|_| self.subject.clone()),
            fragment: patch.fragment.as_ref().map(|_| self.fragment.clone()),
            date: patch.date.and(self.date),
            read: patch.read.map(|_| self.read),
            flagged: patch.flagged.map(|_| self.flagged),
            unread_count: (patch.read.is_some() || patch.unread_count.is_some())
                .then_some(self.unread_count),
            messages_in_conversation: patch
                .messages_in_conversation
                .map(|_| self.messages_in_conversation),
            tags: patch.tags.as_ref().map(|_| self.tags.clone()),
        }
    }
}

/// A partial update for an existing conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationPatch {
    /// Target conversation.
    pub id: ConversationId,
    /// New subject.
    pub subject: Option<String>,
    /// New fragment.
    pub fragment: Option<String>,
    /// New date.
    pub date: Option<DateTime<Utc>>,
    /// New aggregate read state.
    pub read: Option<bool>,
    /// New aggregate flagged state.
    pub flagged: Option<bool>,
    /// New unread count; also decides `read`.
    pub unread_count: Option<u32>,
    /// New server message count.
    pub messages_in_conversation: Option<u32>,
    /// New tag list.
    pub tags: Option<Vec<TagId>>,
}

impl ConversationPatch {
    /// Creates an empty patch for a conversation.
    #[must_use]
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn sample(id: &str, message_ids: &[&str]) -> Conversation {
        Conversation {
            id: ConversationId::new(id),
            subject: "Plans".into(),
            fragment: String::new(),
            date: None,
            participants: Vec::new(),
            messages: message_ids
                .iter()
                .map(|m| ConversationMessage {
                    id: MessageId::new(*m),
                    folder_id: FolderId::inbox(),
                    date: None,
                })
                .collect(),
            messages_in_conversation: u32::try_from(message_ids.len()).unwrap_or(0),
            read: false,
            flagged: false,
            unread_count: 1,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_remove_message_decrements_count() {
        let mut conv = sample("123", &["1", "2"]);
        assert!(conv.remove_message(&MessageId::new("1")));
        assert_eq!(conv.message_ids(), vec![MessageId::new("2")]);
        assert_eq!(conv.messages_in_conversation, 1);
        assert!(!conv.remove_message(&MessageId::new("1")));
        assert_eq!(conv.messages_in_conversation, 1);
    }

    #[test]
    fn test_unread_count_drives_read() {
        let mut conv = sample("123", &["1"]);
        let patch = ConversationPatch {
            unread_count: Some(0),
            ..ConversationPatch::new(ConversationId::new("123"))
        };
        assert!(conv.apply_patch(&patch));
        assert!(conv.read);
        assert_eq!(conv.subject, "Plans");
    }

    #[test]
    fn test_merge_keeps_messages_when_hit_lists_none() {
        let mut conv = sample("123", &["10", "2"]);
        let mut hit = sample("123", &[]);
        hit.messages_in_conversation = 2;
        hit.read = true;
        conv.merge(hit);
        assert_eq!(conv.messages.len(), 2);
        assert!(conv.read);
    }

    #[test]
    fn test_push_front_is_idempotent() {
        let mut conv = sample("123", &["1"]);
        let new = ConversationMessage {
            id: MessageId::new("9"),
            folder_id: FolderId::inbox(),
            date: None,
        };
        conv.push_front(new.clone());
        conv.push_front(new);
        assert_eq!(conv.message_ids()[0], MessageId::new("9"));
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages_in_conversation, 2);
    }
}
