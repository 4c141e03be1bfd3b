//! # mailmirror-wire
//!
//! Wire-level types shared between the `mailmirror` sync engine and the host
//! transport that talks to the mail server.
//!
//! ## Features
//!
//! - **Tolerant records**: every wire field is optional or defaulted, so a
//!   malformed payload deserializes into something the normalizer can degrade
//!   gracefully instead of failing the whole response
//! - **Compact field names**: records keep the server's short keys
//!   (`su`, `fr`, `f`, `tn`, ...) and expose descriptive Rust field names
//! - **Structured faults**: application-level faults travel inside otherwise
//!   successful responses and carry a machine-readable [`FaultCode`]
//! - **Transport seam**: [`MailTransport`] is the only thing a host must
//!   implement to drive the engine
//!
//! ## Example
//!
//! ```ignore
//! use mailmirror_wire::{MailTransport, SearchRequest, ResultType};
//!
//! async fn first_page<T: MailTransport>(transport: &T) -> mailmirror_wire::Result<()> {
//!     let request = SearchRequest::new("in:inbox", ResultType::Conversation).limit(50);
//!     let response = transport.search(request).await?;
//!     println!("{} conversations, more: {}", response.conversations.len(), response.more);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: message, conversation and notify records
//! - [`request`]: search, expansion and action request/response shapes
//! - [`fault`]: application fault codes
//! - [`transport`]: the [`MailTransport`] trait

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod fault;
pub mod request;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use fault::{Fault, FaultCode};
pub use request::{
    ActionOp, ActionRequest, ActionResponse, ExpandRequest, ExpandResponse, FetchMode,
    ResultType, SearchRequest, SearchResponse, SortOrder,
};
pub use transport::MailTransport;
pub use types::{
    WireConversation, WireCreated, WireDeleted, WireMessage, WireMimePart, WireModified,
    WireNotify, WireParticipant,
};
