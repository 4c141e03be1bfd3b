//! Wire records.
//!
//! Every field is optional or defaulted. Deserialization never fails because
//! a field is missing; deciding what a missing field means is the
//! normalizer's job.

mod conversation;
mod message;
mod notify;

pub use conversation::WireConversation;
pub use message::{WireMessage, WireMimePart, WireParticipant};
pub use notify::{WireCreated, WireDeleted, WireModified, WireNotify};
