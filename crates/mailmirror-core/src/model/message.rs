//! Message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flags::MessageFlags;
use super::ids::{ConversationId, FolderId, MessageId, TagId};

/// Role of an address on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// Author.
    From,
    /// Primary recipient.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy.
    Bcc,
    /// Reply-To address.
    ReplyTo,
    /// Sending agent, when different from the author.
    Sender,
    /// Read-receipt address.
    ReadReceipt,
}

impl ParticipantRole {
    /// Decodes a wire role letter. Unknown letters count as recipients.
    #[must_use]
    pub fn from_letter(letter: &str) -> Self {
        match letter {
            "f" => Self::From,
            "c" => Self::Cc,
            "b" => Self::Bcc,
            "r" => Self::ReplyTo,
            "s" => Self::Sender,
            "n" => Self::ReadReceipt,
            _ => Self::To,
        }
    }
}

/// A role-tagged address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Role on the message.
    pub role: ParticipantRole,
    /// Email address.
    pub address: String,
    /// Display name (may be empty).
    pub name: String,
}

impl Participant {
    /// Returns the name if known, otherwise the address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// An attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME part path.
    pub part: String,
    /// Filename (may be empty).
    pub filename: String,
    /// Content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// A normalized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: MessageId,
    /// Parent folder.
    pub folder_id: FolderId,
    /// Conversation, if the message belongs to one.
    pub conversation_id: Option<ConversationId>,
    /// Subject.
    pub subject: String,
    /// Preview fragment.
    pub fragment: String,
    /// Date.
    pub date: Option<DateTime<Utc>>,
    /// Size in bytes.
    pub size: u64,
    /// Display body; `None` until the message is fully loaded.
    pub body: Option<String>,
    /// Attachments; empty until the message is fully loaded.
    pub attachments: Vec<Attachment>,
    /// Participants.
    pub participants: Vec<Participant>,
    /// Flags.
    pub flags: MessageFlags,
    /// Tags.
    pub tags: Vec<TagId>,
    /// Whether body and parts have been fetched.
    pub is_complete: bool,
}

impl Message {
    /// Returns the first participant with the given role.
    #[must_use]
    pub fn participant(&self, role: ParticipantRole) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role == role)
    }

    /// Merges a freshly normalized record into this one.
    ///
    /// Flags and tags come from `incoming`. Header fields, body, attachments
    /// and participants are only taken when `incoming` actually carries them,
    /// and completeness never goes from `true` back to `false`.
    pub fn merge(&mut self, incoming: Self) {
        if !incoming.folder_id.as_str().is_empty() {
            self.folder_id = incoming.folder_id;
        }
        if incoming.conversation_id.is_some() {
            self.conversation_id = incoming.conversation_id;
        }
        if !incoming.subject.is_empty() {
            self.subject = incoming.subject;
        }
        if !incoming.fragment.is_empty() {
            self.fragment = incoming.fragment;
        }
        if incoming.date.is_some() {
            self.date = incoming.date;
        }
        if incoming.size > 0 {
            self.size = incoming.size;
        }
        if !incoming.participants.is_empty() {
            self.participants = incoming.participants;
        }
        if incoming.is_complete {
            self.body = incoming.body;
            self.attachments = incoming.attachments;
        }
        self.flags = incoming.flags;
        self.tags = incoming.tags;
        self.is_complete |= incoming.is_complete;
    }

    /// Applies a partial patch. Returns true if any field changed.
    pub fn apply_patch(&mut self, patch: &MessagePatch) -> bool {
        let before = self.clone();
        if let Some(folder_id) = &patch.folder_id {
            self.folder_id.clone_from(folder_id);
        }
        if let Some(conversation_id) = &patch.conversation_id {
            self.conversation_id = Some(conversation_id.clone());
        }
        if let Some(subject) = &patch.subject {
            self.subject.clone_from(subject);
        }
        if let Some(fragment) = &patch.fragment {
            self.fragment.clone_from(fragment);
        }
        if let Some(date) = patch.date {
            self.date = Some(date);
        }
        if let Some(flags) = patch.flags {
            self.flags = flags;
        }
        if let Some(tags) = &patch.tags {
            self.tags.clone_from(tags);
        }
        *self != before
    }

    /// Captures the current values of the fields `patch` would touch.
    ///
    /// Applying the result undoes `patch`.
    #[must_use]
    pub fn snapshot_for(&self, patch: &MessagePatch) -> MessagePatch {
        MessagePatch {
            id: self.id.clone(),
            folder_id: patch.folder_id.as_ref().map(|_| self.folder_id.clone()),
            conversation_id: patch
                .conversation_id
                .as_ref()
                .and(self.conversation_id.clone()),
            subject: patch.subject.as_ref().map(|_| self.subject.clone()),
            fragment: patch.fragment.as_ref().map(|_| self.fragment.clone()),
            date: patch.date.and(self.date),
            flags: patch.flags.map(|_| self.flags),
            tags: patch.tags.as_ref().map(|_| self.tags.clone()),
        }
    }
}

/// A partial update for an existing message.
///
/// `None` means "not provided", never "clear".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePatch {
    /// Target message.
    pub id: MessageId,
    /// New folder.
    pub folder_id: Option<FolderId>,
    /// New conversation.
    pub conversation_id: Option<ConversationId>,
    /// New subject.
    pub subject: Option<String>,
    /// New fragment.
    pub fragment: Option<String>,
    /// New date.
    pub date: Option<DateTime<Utc>>,
    /// New flags.
    pub flags: Option<MessageFlags>,
    /// New tag list.
    pub tags: Option<Vec<TagId>>,
}

impl MessagePatch {
    /// Creates an empty patch for a message.
    #[must_use]
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Returns true if the patch carries no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.folder_id.is_none()
            && self.conversation_id.is_none()
            && self.subject.is_none()
            && self.fragment.is_none()
            && self.date.is_none()
            && self.flags.is_none()
            && self.tags.is_none()
    }
}
