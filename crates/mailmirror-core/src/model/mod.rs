//! Normalized domain models.

mod conversation;
mod flags;
mod ids;
mod message;
mod tag;

pub use conversation::{Conversation, ConversationMessage, ConversationPatch};
pub use flags::MessageFlags;
pub use ids::{ConversationId, FolderId, MessageId, TagId};
pub use message::{Attachment, Message, MessagePatch, Participant, ParticipantRole};
pub use tag::{Tag, TagCatalog};
