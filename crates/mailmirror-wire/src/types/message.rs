//! Message records.

use serde::{Deserialize, Serialize};

/// A message as the server sends it.
///
/// The same record shape is used for search hits (no parts), expansion
/// results (parts present) and delta patches (only the changed fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message id.
    #[serde(default)]
    pub id: Option<String>,
    /// Parent folder id.
    #[serde(default, rename = "l")]
    pub folder_id: Option<String>,
    /// Conversation id.
    #[serde(default, rename = "cid")]
    pub conversation_id: Option<String>,
    /// Subject.
    #[serde(default, rename = "su")]
    pub subject: Option<String>,
    /// Preview fragment.
    #[serde(default, rename = "fr")]
    pub fragment: Option<String>,
    /// Flag letters, e.g. `"uf"`.
    #[serde(default, rename = "f")]
    pub flags: Option<String>,
    /// Comma-joined tag ids.
    #[serde(default, rename = "t")]
    pub tag_ids: Option<String>,
    /// Comma-joined tag names.
    #[serde(default, rename = "tn")]
    pub tag_names: Option<String>,
    /// Date in milliseconds since the epoch.
    #[serde(default, rename = "d")]
    pub date: Option<i64>,
    /// Size in bytes.
    #[serde(default, rename = "s")]
    pub size: Option<u64>,
    /// Participants.
    #[serde(default, rename = "e")]
    pub participants: Vec<WireParticipant>,
    /// MIME parts; present only on fully fetched messages.
    #[serde(default, rename = "mp")]
    pub parts: Vec<WireMimePart>,
}

impl WireMessage {
    /// Creates a record carrying only an id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// A role-tagged address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireParticipant {
    /// Email address.
    #[serde(default, rename = "a")]
    pub address: Option<String>,
    /// Full personal name.
    #[serde(default, rename = "p")]
    pub name: Option<String>,
    /// Short display name.
    #[serde(default, rename = "d")]
    pub display: Option<String>,
    /// Role letter: `f`, `t`, `c`, `b`, `r`, `s` or `n`.
    #[serde(default, rename = "t")]
    pub role: Option<String>,
}

/// A MIME part of a fully fetched message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMimePart {
    /// Part path, e.g. `"1.2"`.
    #[serde(default)]
    pub part: Option<String>,
    /// Content type.
    #[serde(default, rename = "ct")]
    pub content_type: Option<String>,
    /// Content disposition.
    #[serde(default, rename = "cd")]
    pub disposition: Option<String>,
    /// Attachment filename.
    #[serde(default)]
    pub filename: Option<String>,
    /// Size in bytes.
    #[serde(default, rename = "s")]
    pub size: Option<u64>,
    /// Whether the server picked this part as the display body.
    #[serde(default)]
    pub body: bool,
    /// Inline content, when the server included it.
    #[serde(default)]
    pub content: Option<String>,
    /// Nested parts.
    #[serde(default, rename = "mp")]
    pub parts: Vec<WireMimePart>,
}
