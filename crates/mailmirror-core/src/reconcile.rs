//! Delta reconciler.
//!
//! Applies push notifications to the [`Store`] and [`SearchWindow`] in
//! place. Application is synchronous and total: a malformed entry is skipped
//! with a warning and the rest of the batch still lands.
//!
//! Batches must arrive in sequence order. The first batch sets the baseline;
//! after that each batch must carry `seq == last + 1` and a mailbox-state
//! counter that did not go backwards. Anything else means the local mirror
//! may have diverged, so the reconciler refuses to patch and asks for a
//! resync of the visible query. Until [`Reconciler::rebase`] or
//! [`Reconciler::finish_resync`] is called, further batches are discarded.

use std::collections::HashSet;
use std::fmt;

use mailmirror_wire::{WireConversation, WireMessage, WireNotify};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{ConversationId, ConversationMessage, FolderId, MessageId};
use crate::normalize::{
    normalize_conversation, normalize_conversation_patch, normalize_message,
    normalize_message_patch, parse_id_list,
};
use crate::store::{MergePolicy, OptimisticKey, Store};
use crate::window::SearchWindow;

/// Why a batch could not be applied incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    /// A batch arrived without a sequence number.
    MissingSeq,
    /// One or more batches were skipped.
    Gap {
        /// Sequence number that was due.
        expected: u64,
        /// Sequence number received.
        got: u64,
    },
    /// A batch repeated or went behind an applied one.
    Regression {
        /// Last applied sequence number.
        last: u64,
        /// Sequence number received.
        got: u64,
    },
    /// The mailbox-state counter went backwards.
    ChangeRegression {
        /// Last applied counter.
        last: u64,
        /// Counter received.
        got: u64,
    },
}

impl fmt::Display for ResyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeq => write!(f, "batch without sequence number"),
            Self::Gap { expected, got } => write!(f, "expected seq {expected}, got {got}"),
            Self::Regression { last, got } => write!(f, "seq {got} not after {last}"),
            Self::ChangeRegression { last, got } => {
                write!(f, "change counter went from {last} to {got}")
            }
        }
    }
}

/// Counts of what a batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Entities created.
    pub created: usize,
    /// Entities patched.
    pub modified: usize,
    /// Ids removed from the store or the window.
    pub deleted: usize,
    /// Entries for entities that are not loaded.
    pub ignored: usize,
    /// Malformed entries.
    pub skipped: usize,
}

/// Result of [`Reconciler::apply_delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The batch was applied.
    Applied(ReconcileReport),
    /// The batch was refused; reload the visible query.
    ResyncRequired(ResyncReason),
    /// A resync is already pending; the batch was dropped.
    Discarded,
}

/// Sequence bookkeeping for the push feed.
#[derive(Debug, Clone)]
pub struct Reconciler {
    inbox: FolderId,
    last_seq: Option<u64>,
    last_change: Option<u64>,
    resync_pending: bool,
    seen_seq: Option<u64>,
    seen_change: Option<u64>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(FolderId::inbox())
    }
}

impl Reconciler {
    /// Creates a reconciler with no baseline.
    #[must_use]
    pub const fn new(inbox: FolderId) -> Self {
        Self {
            inbox,
            last_seq: None,
            last_change: None,
            resync_pending: false,
            seen_seq: None,
            seen_change: None,
        }
    }

    /// Last applied sequence number.
    #[must_use]
    pub const fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Last applied mailbox-state counter.
    #[must_use]
    pub const fn last_change(&self) -> Option<u64> {
        self.last_change
    }

    /// Returns true while batches are being discarded.
    #[must_use]
    pub const fn resync_pending(&self) -> bool {
        self.resync_pending
    }

    /// Sets the baseline after a reload and resumes applying batches.
    pub fn rebase(&mut self, seq: Option<u64>, change: Option<u64>) {
        info!(?seq, ?change, "Reconciler rebased");
        self.last_seq = seq;
        self.last_change = change;
        self.resync_pending = false;
        self.seen_seq = None;
        self.seen_change = None;
    }

    /// Rebases on the newest counters seen since the resync was requested.
    pub fn finish_resync(&mut self) {
        let seq = self.seen_seq.or(self.last_seq);
        let change = self.seen_change.or(self.last_change);
        self.rebase(seq, change);
    }

    /// Applies one notification batch.
    pub fn apply_delta(
        &mut self,
        store: &mut Store,
        window: &mut SearchWindow,
        notify: &WireNotify,
    ) -> ReconcileOutcome {
        if self.resync_pending {
            self.observe(notify);
            debug!(seq = ?notify.seq, "Discarding batch while resync is pending");
            return ReconcileOutcome::Discarded;
        }
        if let Err(reason) = self.check_order(notify) {
            info!(%reason, "Delta stream diverged, resync required");
            self.resync_pending = true;
            self.observe(notify);
            return ReconcileOutcome::ResyncRequired(reason);
        }
        self.last_seq = notify.seq;
        if notify.change.is_some() {
            self.last_change = notify.change;
        }

        let mut report = ReconcileReport::default();
        if let Some(ids) = notify.deleted.ids.as_deref() {
            for id in parse_id_list(ids) {
                if purge_id(store, window, &id) {
                    report.deleted += 1;
                } else {
                    report.ignored += 1;
                }
            }
        }
        for wire in &notify.modified.messages {
            self.modify_message(store, window, wire, &mut report);
        }
        for wire in &notify.modified.conversations {
            modify_conversation(store, wire, &mut report);
        }
        for wire in &notify.created.conversations {
            self.create_conversation(store, window, wire, &mut report);
        }
        for wire in &notify.created.messages {
            self.create_message(store, window, wire, &mut report);
        }

        debug!(seq = ?notify.seq, ?report, "Delta applied");
        ReconcileOutcome::Applied(report)
    }

    fn check_order(&self, notify: &WireNotify) -> Result<(), ResyncReason> {
        let Some(last) = self.last_seq else {
            return Ok(());
        };
        let got = notify.seq.ok_or(ResyncReason::MissingSeq)?;
        if got <= last {
            return Err(ResyncReason::Regression { last, got });
        }
        let expected = last + 1;
        if got != expected {
            return Err(ResyncReason::Gap { expected, got });
        }
        if let (Some(last), Some(got)) = (self.last_change, notify.change)
            && got < last
        {
            return Err(ResyncReason::ChangeRegression { last, got });
        }
        Ok(())
    }

    fn observe(&mut self, notify: &WireNotify) {
        if notify.seq > self.seen_seq {
            self.seen_seq = notify.seq;
        }
        if notify.change > self.seen_change {
            self.seen_change = notify.change;
        }
    }

    fn modify_message(
        &self,
        store: &mut Store,
        window: &mut SearchWindow,
        wire: &WireMessage,
        report: &mut ReconcileReport,
    ) {
        let Some(patch) = normalize_message_patch(wire, store.tags()) else {
            warn!("Skipping modified message without id");
            report.skipped += 1;
            return;
        };
        let id = patch.id.clone();
        let loaded = store.message(&id).is_some();
        if loaded {
            store.patch_messages([patch.clone()]);
            store.clear_optimistic(&OptimisticKey::Message(id.clone()));
        }

        let mut touched = loaded;
        if let Some(folder) = &patch.folder_id {
            touched |= !mirror_folder(store, &id, folder).is_empty();
            if folder != &self.inbox && window.is_default_inbox_view() {
                if window.remove_message(&id) {
                    debug!(%id, %folder, "Message left the inbox view");
                }
                self.drop_conversations_without_inbox(store, window);
            }
        }

        if touched {
            report.modified += 1;
        } else {
            report.ignored += 1;
        }
    }

    fn drop_conversations_without_inbox(&self, store: &Store, window: &mut SearchWindow) {
        let gone: Vec<ConversationId> = window
            .conversation_ids()
            .iter()
            .filter(|cid| {
                store.conversation(cid).is_some_and(|c| {
                    !c.messages.is_empty() && c.messages.iter().all(|m| m.folder_id != self.inbox)
                })
            })
            .cloned()
            .collect();
        for cid in gone {
            debug!(%cid, "Conversation left the inbox view");
            window.remove_conversation(&cid);
        }
    }

    fn create_conversation(
        &self,
        store: &mut Store,
        window: &mut SearchWindow,
        wire: &WireConversation,
        report: &mut ReconcileReport,
    ) {
        let conversation = normalize_conversation(wire, store.tags());
        if conversation.id.as_str().is_empty() {
            warn!("Skipping created conversation without id");
            report.skipped += 1;
            return;
        }
        let id = conversation.id.clone();
        let in_inbox = conversation
            .messages
            .iter()
            .any(|m| m.folder_id == self.inbox);
        store.upsert_conversations([conversation], MergePolicy::Replace);
        if in_inbox && window.is_default_inbox_view() {
            window.insert_conversation_front(id);
        }
        report.created += 1;
    }

    fn create_message(
        &self,
        store: &mut Store,
        window: &mut SearchWindow,
        wire: &WireMessage,
        report: &mut ReconcileReport,
    ) {
        let message = normalize_message(wire, false);
        if message.id.as_str().is_empty() {
            warn!("Skipping created message without id");
            report.skipped += 1;
            return;
        }
        let id = message.id.clone();
        let in_inbox = message.folder_id == self.inbox;
        let conversation_id = message.conversation_id.clone();
        let summary = ConversationMessage {
            id: id.clone(),
            folder_id: message.folder_id.clone(),
            date: message.date,
        };
        store.upsert_messages([message], MergePolicy::Replace);

        if let Some(cid) = &conversation_id {
            store.update_conversation(cid, |c| c.push_front(summary));
        }
        if in_inbox && window.is_default_inbox_view() {
            window.insert_message_front(id);
            if let Some(cid) = conversation_id
                && store.conversation(&cid).is_some()
            {
                window.insert_conversation_front(cid);
            }
        }
        report.created += 1;
    }
}

fn modify_conversation(store: &mut Store, wire: &WireConversation, report: &mut ReconcileReport) {
    let Some(patch) = normalize_conversation_patch(wire, store.tags()) else {
        warn!("Skipping modified conversation without id");
        report.skipped += 1;
        return;
    };
    let id = patch.id.clone();
    let Some(current) = store.conversation(&id) else {
        report.ignored += 1;
        return;
    };
    let count_changed = patch
        .messages_in_conversation
        .is_some_and(|n| n != current.messages_in_conversation);
    store.patch_conversations([patch]);
    store.clear_optimistic(&OptimisticKey::Conversation(id.clone()));
    if count_changed {
        store.invalidate_expansion(&id);
    }
    report.modified += 1;
}

/// Removes an id from every index, whether it names a message or a
/// conversation. Messages owned by a removed conversation go with it.
///
/// Returns true if anything was removed.
pub(crate) fn purge_id(store: &mut Store, window: &mut SearchWindow, id: &str) -> bool {
    let message_id = MessageId::from(id);
    let conversation_id = ConversationId::from(id);
    let mut removed = false;

    let owned: HashSet<MessageId> = if store.conversation(&conversation_id).is_some() {
        store.message_ids_in(&conversation_id).into_iter().collect()
    } else {
        HashSet::new()
    };
    removed |= !store.remove_conversations([&conversation_id]).is_empty();
    removed |= window.remove_conversation(&conversation_id);
    for owned_id in &owned {
        window.remove_message(owned_id);
    }
    store.remove_messages(&owned);

    for owned_id in &owned {
        store.record_deleted_message(owned_id);
    }
    store.record_deleted_message(&message_id);
    removed |= !store.remove_messages([&message_id]).is_empty();
    removed |= window.remove_message(&message_id);
    let listing: Vec<ConversationId> = store
        .conversations()
        .filter(|c| c.contains(&message_id))
        .map(|c| c.id.clone())
        .collect();
    for cid in listing {
        store.update_conversation(&cid, |c| c.remove_message(&message_id));
        removed = true;
    }
    removed
}

/// Writes a new folder into every conversation summary that lists the
/// message. Returns the conversations touched.
fn mirror_folder(store: &mut Store, id: &MessageId, folder: &FolderId) -> Vec<ConversationId> {
    let listing: Vec<ConversationId> = store
        .conversations()
        .filter(|c| c.contains(id))
        .map(|c| c.id.clone())
        .collect();
    for cid in &listing {
        store.update_conversation(cid, |c| {
            for summary in c.messages.iter_mut().filter(|m| &m.id == id) {
                summary.folder_id.clone_from(folder);
            }
        });
    }
    listing
}
