//! # mailmirror-core
//!
//! Client-side incremental synchronization engine for a remote mailbox.
//!
//! This crate provides:
//! - **Entity Normalizer** - wire records to canonical messages and conversations
//! - **Normalized Store** - the single owner of every loaded entity
//! - **Search Window** - the paginated id list of the active query
//! - **Conversation Expansion** - single-flight fetch of full message lists
//! - **Delta Reconciler** - in-place application of push notifications
//! - **Action Layer** - remote mutations with optimistic patches and rollback
//! - **Sync Engine** - an async facade tying the above to a [`MailTransport`]
//!
//! [`MailTransport`]: mailmirror_wire::MailTransport
//!
//! ## Example
//!
//! ```ignore
//! use mailmirror_core::{ConversationId, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(transport, SyncConfig::default());
//! engine.search("in:inbox").await?;
//! for conversation in engine.visible_conversations() {
//!     println!("{}", conversation.subject);
//! }
//! engine.expand_conversation(&ConversationId::new("123")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod action;
pub mod config;
pub mod engine;
mod error;
pub mod expansion;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod store;
pub mod window;

pub use action::{Action, ActionTarget, Operation, OptimisticPatches, OptimisticWrite};
pub use config::SyncConfig;
pub use engine::{PageOutcome, SyncEngine};
pub use error::{Error, Result};
pub use expansion::{ExpansionOutcome, ExpansionStatus, ExpansionTicket};
pub use model::{
    Attachment, Conversation, ConversationId, ConversationMessage, ConversationPatch, FolderId,
    Message, MessageFlags, MessageId, MessagePatch, Participant, ParticipantRole, Tag,
    TagCatalog, TagId,
};
pub use reconcile::{ReconcileOutcome, ReconcileReport, Reconciler, ResyncReason};
pub use store::{MergePolicy, OptimisticKey, Store};
pub use window::{AppendTicket, QueryTicket, RequestStatus, SearchWindow, WindowIds};
