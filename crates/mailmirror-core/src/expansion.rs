//! Conversation expansion controller.
//!
//! Fetching the full message list of a conversation is single-flight per
//! conversation id. The caller that finds a conversation `Unexpanded` writes
//! `Pending` and a fresh token into the store *before* awaiting the fetch, so
//! any concurrent caller sees `Pending` and backs off.
//!
//! ```text
//! Unexpanded ──begin──▶ Pending ──ok──▶ Fulfilled
//!                          │
//!                          └──err──▶ Error
//! ```
//!
//! `Fulfilled` and `Error` are terminal until the store invalidates the
//! expansion. A result that comes back after invalidation, or after a newer
//! fetch was issued, no longer matches the stored token and is dropped.

use mailmirror_wire::WireMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::{ConversationId, ConversationMessage};
use crate::normalize::normalize_message;
use crate::store::{MergePolicy, Store};

/// Expansion state of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionStatus {
    /// Never fetched, or invalidated.
    #[default]
    Unexpanded,
    /// A fetch is outstanding.
    Pending,
    /// The full message list is loaded.
    Fulfilled,
    /// The last fetch failed.
    Error,
}

/// Proof that the holder issued the current fetch for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionTicket {
    conversation_id: ConversationId,
    token: u64,
}

impl ExpansionTicket {
    /// The conversation being expanded.
    #[must_use]
    pub const fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// The request token.
    #[must_use]
    pub const fn token(&self) -> u64 {
        self.token
    }
}

/// What [`complete_expansion`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// The message list was replaced.
    Fulfilled {
        /// Number of messages stored.
        messages: usize,
    },
    /// The fetch failed; the conversation is in `Error`.
    Failed,
    /// The ticket no longer matches; nothing was written.
    Stale,
}

/// Starts an expansion.
///
/// Returns `None` when the conversation is not loaded or its status is
/// anything but `Unexpanded`; the caller must not fetch in that case.
pub fn begin_expansion(store: &mut Store, id: &ConversationId) -> Option<ExpansionTicket> {
    store.conversation(id)?;
    let status = store.expansion_status(id);
    if status != ExpansionStatus::Unexpanded {
        debug!(%id, ?status, "Expansion already started");
        return None;
    }
    let token = store.start_expansion(id);
    debug!(%id, token, "Expansion pending");
    Some(ExpansionTicket {
        conversation_id: id.clone(),
        token,
    })
}

/// Writes an expansion result back.
///
/// On success every message is stored complete with the replace policy and
/// the conversation's message list becomes exactly the returned order,
/// minus any message deleted while the fetch was pending. On failure the
/// message list is left untouched.
pub fn complete_expansion(
    store: &mut Store,
    ticket: &ExpansionTicket,
    result: Result<Vec<WireMessage>, &Error>,
) -> ExpansionOutcome {
    let id = &ticket.conversation_id;
    let deleted = match store.expansion_entry(id) {
        Some(entry)
            if entry.token == ticket.token
                && entry.status == ExpansionStatus::Pending
                && store.conversation(id).is_some() =>
        {
            entry.deleted.clone()
        }
        _ => {
            warn!(%id, token = ticket.token, "Dropping stale expansion result");
            return ExpansionOutcome::Stale;
        }
    };

    let wire_messages = match result {
        Ok(messages) => messages,
        Err(err) => {
            warn!(%id, error = %err, "Expansion failed");
            store.finish_expansion(id, ExpansionStatus::Error);
            return ExpansionOutcome::Failed;
        }
    };

    let mut messages = Vec::with_capacity(wire_messages.len());
    for wire in &wire_messages {
        let mut message = normalize_message(wire, true);
        if message.id.as_str().is_empty() {
            warn!(%id, "Skipping expanded message without id");
            continue;
        }
        if deleted.contains(&message.id) {
            debug!(%id, message = %message.id, "Skipping message deleted during expansion");
            continue;
        }
        if message.conversation_id.is_none() {
            message.conversation_id = Some(id.clone());
        }
        messages.push(message);
    }

    let order: Vec<ConversationMessage> = messages
        .iter()
        .map(|m| ConversationMessage {
            id: m.id.clone(),
            folder_id: m.folder_id.clone(),
            date: m.date,
        })
        .collect();
    let count = messages.len();
    store.upsert_messages(messages, MergePolicy::Replace);
    store.set_conversation_messages(id, order);
    store.finish_expansion(id, ExpansionStatus::Fulfilled);
    debug!(%id, messages = count, "Expansion fulfilled");
    ExpansionOutcome::Fulfilled { messages: count }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailmirror_wire::{Fault, FaultCode};

    use super::*;
    use crate::model::{MessageId, fixtures};

    fn store_with_123() -> Store {
        let mut store = Store::new();
        store.upsert_messages([fixtures::message("1")], MergePolicy::Replace);
        store.upsert_conversations([fixtures::conversation("123", &["1"])], MergePolicy::Replace);
        store
    }

    fn wire(id: &str) -> WireMessage {
        WireMessage {
            conversation_id: Some("123".into()),
            ..WireMessage::with_id(id)
        }
    }

    #[test]
    fn test_expansion_replaces_message_list() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");

        let ticket = begin_expansion(&mut store, &id).unwrap();
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Pending);

        let outcome = complete_expansion(&mut store, &ticket, Ok(vec![wire("10"), wire("2")]));
        assert_eq!(outcome, ExpansionOutcome::Fulfilled { messages: 2 });

        let conv = store.conversation(&id).unwrap();
        assert_eq!(
            conv.message_ids(),
            vec![MessageId::new("10"), MessageId::new("2")]
        );
        for mid in ["10", "2"] {
            assert!(store.message(&MessageId::new(mid)).unwrap().is_complete);
        }
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Fulfilled);
    }

    #[test]
    fn test_single_flight() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");
        assert!(begin_expansion(&mut store, &id).is_some());
        assert!(begin_expansion(&mut store, &id).is_none());
    }

    #[test]
    fn test_fulfilled_needs_invalidation() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");
        let ticket = begin_expansion(&mut store, &id).unwrap();
        complete_expansion(&mut store, &ticket, Ok(vec![wire("10"), wire("2")]));
        assert!(begin_expansion(&mut store, &id).is_none());

        store.invalidate_expansion(&id);
        let ticket = begin_expansion(&mut store, &id).unwrap();
        complete_expansion(&mut store, &ticket, Ok(vec![wire("2")]));
        assert_eq!(
            store.conversation(&id).unwrap().message_ids(),
            vec![MessageId::new("2")]
        );
    }

    #[test]
    fn test_failure_keeps_message_list() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");
        let ticket = begin_expansion(&mut store, &id).unwrap();

        let fault = Fault::new(FaultCode::NoSuchConversation, "gone");
        let outcome = complete_expansion(&mut store, &ticket, Err(&Error::Fault(fault)));
        assert_eq!(outcome, ExpansionOutcome::Failed);
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Error);
        assert_eq!(
            store.conversation(&id).unwrap().message_ids(),
            vec![MessageId::new("1")]
        );
        assert!(begin_expansion(&mut store, &id).is_none());
    }

    #[test]
    fn test_stale_after_invalidation() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");
        let old = begin_expansion(&mut store, &id).unwrap();
        store.invalidate_expansion(&id);
        let new = begin_expansion(&mut store, &id).unwrap();
        assert!(new.token() > old.token());

        assert_eq!(
            complete_expansion(&mut store, &old, Ok(vec![wire("99")])),
            ExpansionOutcome::Stale
        );
        assert!(store.message(&MessageId::new("99")).is_none());
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Pending);

        complete_expansion(&mut store, &new, Ok(vec![wire("10")]));
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Fulfilled);
    }

    #[test]
    fn test_stale_after_conversation_deleted() {
        let mut store = store_with_123();
        let id = ConversationId::new("123");
        let ticket = begin_expansion(&mut store, &id).unwrap();
        store.remove_conversations([&id]);
        assert_eq!(
            complete_expansion(&mut store, &ticket, Ok(vec![wire("10")])),
            ExpansionOutcome::Stale
        );
        assert!(store.message(&MessageId::new("10")).is_none());
    }

    #[test]
    fn test_delete_during_expansion_is_not_undone() {
        let mut store = store_with_123();
        let mut window = crate::window::SearchWindow::default();
        let id = ConversationId::new("123");
        let ticket = begin_expansion(&mut store, &id).unwrap();

        let mut notify = mailmirror_wire::WireNotify::new(1);
        notify.deleted.ids = Some("2".into());
        crate::reconcile::Reconciler::default().apply_delta(&mut store, &mut window, &notify);

        let outcome = complete_expansion(&mut store, &ticket, Ok(vec![wire("10"), wire("2")]));
        assert_eq!(outcome, ExpansionOutcome::Fulfilled { messages: 1 });
        assert!(store.message(&MessageId::new("2")).is_none());
        assert_eq!(
            store.conversation(&id).unwrap().message_ids(),
            vec![MessageId::new("10")]
        );

        store.invalidate_expansion(&id);
        let ticket = begin_expansion(&mut store, &id).unwrap();
        complete_expansion(&mut store, &ticket, Ok(vec![wire("10"), wire("11")]));
        assert_eq!(store.conversation(&id).unwrap().message_ids().len(), 2);
    }

    #[test]
    fn test_unloaded_conversation_not_started() {
        let mut store = Store::new();
        assert!(begin_expansion(&mut store, &ConversationId::new("7")).is_none());
        assert_eq!(
            store.expansion_status(&ConversationId::new("7")),
            ExpansionStatus::Unexpanded
        );
    }
}
