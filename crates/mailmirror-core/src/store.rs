//! Normalized store.
//!
//! The single owner of every [`Message`] and [`Conversation`] the client has
//! seen. The search window, the expansion controller, the reconciler and the
//! action layer all mutate through the primitives here, which is what lets an
//! optimistic patch and a later delta compose instead of clobbering each
//! other.
//!
//! The store knows nothing about the search window. Keeping the window in
//! step with removals is the reconciler's job.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::expansion::ExpansionStatus;
use crate::model::{
    Conversation, ConversationId, ConversationMessage, ConversationPatch, Message, MessageId,
    MessagePatch, TagCatalog,
};

/// How an upsert treats an entity that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Overwrite the existing entity (full response).
    #[default]
    Replace,
    /// Merge into the existing entity, keeping what the incoming record
    /// does not carry (body of a complete message, an expanded message list).
    Merge,
}

/// Key into the optimistic ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptimisticKey {
    /// A message.
    Message(MessageId),
    /// A conversation.
    Conversation(ConversationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpansionEntry {
    pub(crate) status: ExpansionStatus,
    pub(crate) token: u64,
    /// Messages deleted while the fetch was pending.
    pub(crate) deleted: HashSet<MessageId>,
}

/// In-memory mirror of the remote mailbox.
#[derive(Debug, Default)]
pub struct Store {
    messages: HashMap<MessageId, Message>,
    conversations: HashMap<ConversationId, Conversation>,
    expansions: HashMap<ConversationId, ExpansionEntry>,
    next_token: u64,
    optimistic: HashMap<OptimisticKey, u64>,
    next_version: u64,
    tags: TagCatalog,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a tag catalog.
    #[must_use]
    pub fn with_tags(tags: TagCatalog) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    /// Returns the tag catalog.
    #[must_use]
    pub const fn tags(&self) -> &TagCatalog {
        &self.tags
    }

    /// Replaces the tag catalog.
    pub fn set_tags(&mut self, tags: TagCatalog) {
        self.tags = tags;
    }

    /// Looks up a message. `None` means "not loaded yet".
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    /// Looks up a conversation. `None` means "not loaded yet".
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Number of loaded messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of loaded conversations.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Iterates loaded conversations in no particular order.
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    /// Ids of loaded messages that name `conversation_id` as their parent.
    #[must_use]
    pub fn message_ids_in(&self, conversation_id: &ConversationId) -> Vec<MessageId> {
        self.messages
            .values()
            .filter(|m| m.conversation_id.as_ref() == Some(conversation_id))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Inserts or updates messages.
    ///
    /// Records without an id are skipped. Returns the number stored.
    pub fn upsert_messages(
        &mut self,
        messages: impl IntoIterator<Item = Message>,
        policy: MergePolicy,
    ) -> usize {
        let mut stored = 0;
        for message in messages {
            if message.id.as_str().is_empty() {
                warn!("Skipping message without id");
                continue;
            }
            match (policy, self.messages.get_mut(&message.id)) {
                (MergePolicy::Merge, Some(existing)) => existing.merge(message),
                _ => {
                    self.messages.insert(message.id.clone(), message);
                }
            }
            stored += 1;
        }
        debug!(stored, ?policy, "Upserted messages");
        stored
    }

    /// Inserts or updates conversations.
    ///
    /// `Replace` invalidates the expansion of a conversation whose message
    /// list changed. `Merge` keeps the message list of a fulfilled expansion.
    /// Records without an id are skipped. Returns the number stored.
    pub fn upsert_conversations(
        &mut self,
        conversations: impl IntoIterator<Item = Conversation>,
        policy: MergePolicy,
    ) -> usize {
        let mut stored = 0;
        for mut conversation in conversations {
            if conversation.id.as_str().is_empty() {
                warn!("Skipping conversation without id");
                continue;
            }
            let id = conversation.id.clone();
            let fulfilled = self.expansion_status(&id) == ExpansionStatus::Fulfilled;
            let invalidate = match (policy, self.conversations.get_mut(&id)) {
                (MergePolicy::Merge, Some(existing)) => {
                    if fulfilled {
                        conversation.messages.clear();
                    }
                    let before = existing.message_ids();
                    existing.merge(conversation);
                    existing.message_ids() != before
                }
                _ => self
                    .conversations
                    .insert(id.clone(), conversation)
                    .is_some_and(|previous| {
                        self.conversations
                            .get(&id)
                            .is_some_and(|current| !current.same_messages(&previous))
                    }),
            };
            stored += 1;
            if invalidate {
                self.invalidate_expansion(&id);
            }
        }
        debug!(stored, ?policy, "Upserted conversations");
        stored
    }

    /// Applies partial patches to loaded messages.
    ///
    /// Ids that are not loaded are ignored; a patch never creates an entity.
    /// Returns the ids that changed.
    pub fn patch_messages(
        &mut self,
        patches: impl IntoIterator<Item = MessagePatch>,
    ) -> Vec<MessageId> {
        let mut changed = Vec::new();
        for patch in patches {
            match self.messages.get_mut(&patch.id) {
                Some(message) => {
                    if message.apply_patch(&patch) {
                        changed.push(patch.id);
                    }
                }
                None => debug!(id = %patch.id, "Ignoring patch for unloaded message"),
            }
        }
        changed
    }

    /// Applies partial patches to loaded conversations.
    ///
    /// Ids that are not loaded are ignored. Returns the ids that changed.
    pub fn patch_conversations(
        &mut self,
        patches: impl IntoIterator<Item = ConversationPatch>,
    ) -> Vec<ConversationId> {
        let mut changed = Vec::new();
        for patch in patches {
            match self.conversations.get_mut(&patch.id) {
                Some(conversation) => {
                    if conversation.apply_patch(&patch) {
                        changed.push(patch.id);
                    }
                }
                None => debug!(id = %patch.id, "Ignoring patch for unloaded conversation"),
            }
        }
        changed
    }

    /// Runs `f` on a loaded conversation.
    ///
    /// Returns `None` if the conversation is not loaded.
    pub fn update_conversation<R>(
        &mut self,
        id: &ConversationId,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Option<R> {
        self.conversations.get_mut(id).map(f)
    }

    /// Replaces the message list of a loaded conversation, in order.
    ///
    /// Returns false if the conversation is not loaded.
    pub fn set_conversation_messages(
        &mut self,
        id: &ConversationId,
        messages: Vec<ConversationMessage>,
    ) -> bool {
        self.update_conversation(id, |conversation| {
            let listed = u32::try_from(messages.len()).unwrap_or(u32::MAX);
            conversation.messages = messages;
            conversation.messages_in_conversation =
                conversation.messages_in_conversation.max(listed);
        })
        .is_some()
    }

    /// Removes messages. Returns the removed entities.
    pub fn remove_messages<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a MessageId>,
    ) -> Vec<Message> {
        let removed: Vec<Message> = ids
            .into_iter()
            .filter_map(|id| {
                self.optimistic.remove(&OptimisticKey::Message(id.clone()));
                self.messages.remove(id)
            })
            .collect();
        if !removed.is_empty() {
            debug!(count = removed.len(), "Removed messages");
        }
        removed
    }

    /// Removes conversations and their expansion bookkeeping.
    ///
    /// An expansion still in flight for a removed conversation will find its
    /// ticket stale. Returns the removed entities.
    pub fn remove_conversations<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a ConversationId>,
    ) -> Vec<Conversation> {
        let removed: Vec<Conversation> = ids
            .into_iter()
            .filter_map(|id| {
                self.expansions.remove(id);
                self.optimistic
                    .remove(&OptimisticKey::Conversation(id.clone()));
                self.conversations.remove(id)
            })
            .collect();
        if !removed.is_empty() {
            debug!(count = removed.len(), "Removed conversations");
        }
        removed
    }

    /// Returns the expansion status of a conversation.
    #[must_use]
    pub fn expansion_status(&self, id: &ConversationId) -> ExpansionStatus {
        self.expansions
            .get(id)
            .map_or(ExpansionStatus::Unexpanded, |e| e.status)
    }

    /// Forgets the expansion of a conversation so the next request refetches.
    ///
    /// A fetch still in flight for it becomes stale.
    pub fn invalidate_expansion(&mut self, id: &ConversationId) {
        if self.expansions.remove(id).is_some() {
            debug!(%id, "Invalidated expansion");
        }
    }

    /// Forgets every expansion.
    pub fn invalidate_all_expansions(&mut self) {
        self.expansions.clear();
    }

    pub(crate) fn expansion_entry(&self, id: &ConversationId) -> Option<&ExpansionEntry> {
        self.expansions.get(id)
    }

    /// Remembers a deleted message id on every pending expansion, so a
    /// response fetched before the delete cannot bring it back.
    pub(crate) fn record_deleted_message(&mut self, id: &MessageId) {
        for entry in self
            .expansions
            .values_mut()
            .filter(|e| e.status == ExpansionStatus::Pending)
        {
            entry.deleted.insert(id.clone());
        }
    }

    /// Writes `Pending` with a fresh token and returns the token.
    pub(crate) fn start_expansion(&mut self, id: &ConversationId) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.expansions.insert(
            id.clone(),
            ExpansionEntry {
                status: ExpansionStatus::Pending,
                token,
                deleted: HashSet::new(),
            },
        );
        token
    }

    pub(crate) fn finish_expansion(&mut self, id: &ConversationId, status: ExpansionStatus) {
        if let Some(entry) = self.expansions.get_mut(id) {
            entry.status = status;
            entry.deleted.clear();
        }
    }

    /// Records an optimistic write and returns its ledger version.
    pub fn mark_optimistic(&mut self, key: OptimisticKey) -> u64 {
        self.next_version += 1;
        self.optimistic.insert(key, self.next_version);
        self.next_version
    }

    /// Returns the version of the latest optimistic write on `key`.
    #[must_use]
    pub fn optimistic_version(&self, key: &OptimisticKey) -> Option<u64> {
        self.optimistic.get(key).copied()
    }

    /// Drops the optimistic mark on `key`, whoever wrote it.
    pub fn clear_optimistic(&mut self, key: &OptimisticKey) {
        self.optimistic.remove(key);
    }

    /// Drops the optimistic mark on `key` only if it is still `version`.
    ///
    /// Returns true if the mark matched.
    pub fn clear_optimistic_if(&mut self, key: &OptimisticKey, version: u64) -> bool {
        if self.optimistic.get(key) == Some(&version) {
            self.optimistic.remove(key);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{FolderId, MessageFlags, fixtures};

    #[test]
    fn test_get_missing_is_none() {
        let store = Store::new();
        assert!(store.message(&MessageId::new("1")).is_none());
        assert!(store.conversation(&ConversationId::new("1")).is_none());
    }

    #[test]
    fn test_replace_overwrites() {
        let mut store = Store::new();
        let mut complete = fixtures::message("1");
        complete.body = Some("body".into());
        complete.is_complete = true;
        store.upsert_messages([complete], MergePolicy::Replace);

        store.upsert_messages([fixtures::message("1")], MergePolicy::Replace);
        let msg = store.message(&MessageId::new("1")).unwrap();
        assert!(!msg.is_complete);
        assert!(msg.body.is_none());
    }

    #[test]
    fn test_merge_keeps_complete_body() {
        let mut store = Store::new();
        let mut complete = fixtures::message("1");
        complete.body = Some("body".into());
        complete.is_complete = true;
        store.upsert_messages([complete], MergePolicy::Replace);

        let mut hit = fixtures::message("1");
        hit.flags = MessageFlags::parse("f");
        store.upsert_messages([hit], MergePolicy::Merge);

        let msg = store.message(&MessageId::new("1")).unwrap();
        assert!(msg.is_complete);
        assert_eq!(msg.body.as_deref(), Some("body"));
        assert!(msg.flags.flagged);
    }

    #[test]
    fn test_skips_records_without_id() {
        let mut store = Store::new();
        assert_eq!(
            store.upsert_messages([fixtures::message("")], MergePolicy::Replace),
            0
        );
        assert_eq!(store.message_count(), 0);
    }

    #[test]
    fn test_patch_only_provided_fields() {
        let mut store = Store::new();
        store.upsert_messages([fixtures::message("1")], MergePolicy::Replace);
        let before = store.message(&MessageId::new("1")).unwrap().clone();

        let changed = store.patch_messages([MessagePatch {
            flags: Some(MessageFlags::parse("")),
            ..MessagePatch::new(MessageId::new("1"))
        }]);
        assert_eq!(changed, vec![MessageId::new("1")]);

        let after = store.message(&MessageId::new("1")).unwrap();
        assert!(after.flags.read);
        assert_eq!(after.subject, before.subject);
        assert_eq!(after.folder_id, before.folder_id);
        assert_eq!(after.participants, before.participants);
        assert_eq!(after.conversation_id, before.conversation_id);
    }

    #[test]
    fn test_patch_never_creates() {
        let mut store = Store::new();
        let changed = store.patch_messages([MessagePatch {
            folder_id: Some(FolderId::trash()),
            ..MessagePatch::new(MessageId::new("404"))
        }]);
        assert!(changed.is_empty());
        assert!(store.message(&MessageId::new("404")).is_none());
    }

    #[test]
    fn test_remove_messages() {
        let mut store = Store::new();
        store.upsert_messages(
            [fixtures::message("1"), fixtures::message("2")],
            MergePolicy::Replace,
        );
        let removed = store.remove_messages(&[MessageId::new("1"), MessageId::new("9")]);
        assert_eq!(removed.len(), 1);
        assert!(store.message(&MessageId::new("1")).is_none());
        assert!(store.message(&MessageId::new("2")).is_some());
    }

    #[test]
    fn test_replace_with_new_message_list_invalidates_expansion() {
        let mut store = Store::new();
        let id = ConversationId::new("123");
        store.upsert_conversations([fixtures::conversation("123", &["1"])], MergePolicy::Replace);
        store.start_expansion(&id);
        store.finish_expansion(&id, ExpansionStatus::Fulfilled);

        store.upsert_conversations([fixtures::conversation("123", &["1"])], MergePolicy::Replace);
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Fulfilled);

        store.upsert_conversations(
            [fixtures::conversation("123", &["5", "1"])],
            MergePolicy::Replace,
        );
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Unexpanded);
    }

    #[test]
    fn test_merge_keeps_expanded_message_list() {
        let mut store = Store::new();
        let id = ConversationId::new("123");
        store.upsert_conversations(
            [fixtures::conversation("123", &["10", "2"])],
            MergePolicy::Replace,
        );
        store.start_expansion(&id);
        store.finish_expansion(&id, ExpansionStatus::Fulfilled);

        let mut hit = fixtures::conversation("123", &["10"]);
        hit.read = true;
        store.upsert_conversations([hit], MergePolicy::Merge);

        let conv = store.conversation(&id).unwrap();
        assert_eq!(conv.message_ids(), vec![MessageId::new("10"), MessageId::new("2")]);
        assert!(conv.read);
        assert_eq!(store.expansion_status(&id), ExpansionStatus::Fulfilled);
    }

    #[test]
    fn test_remove_conversation_drops_expansion() {
        let mut store = Store::new();
        let id = ConversationId::new("123");
        store.upsert_conversations([fixtures::conversation("123", &["1"])], MergePolicy::Replace);
        store.start_expansion(&id);

        store.remove_conversations([&id]);
        assert!(store.conversation(&id).is_none());
        assert!(store.expansion_entry(&id).is_none());
    }

    #[test]
    fn test_optimistic_ledger() {
        let mut store = Store::new();
        let key = OptimisticKey::Message(MessageId::new("1"));
        let first = store.mark_optimistic(key.clone());
        let second = store.mark_optimistic(key.clone());
        assert!(second > first);

        assert!(!store.clear_optimistic_if(&key, first));
        assert_eq!(store.optimistic_version(&key), Some(second));
        assert!(store.clear_optimistic_if(&key, second));
        assert_eq!(store.optimistic_version(&key), None);
    }

    #[test]
    fn test_message_ids_in_conversation() {
        let mut store = Store::new();
        let mut standalone = fixtures::message("3");
        standalone.conversation_id = None;
        store.upsert_messages(
            [fixtures::message("1"), fixtures::message("2"), standalone],
            MergePolicy::Replace,
        );
        let mut ids = store.message_ids_in(&ConversationId::new("123"));
        ids.sort();
        assert_eq!(ids, vec![MessageId::new("1"), MessageId::new("2")]);
    }
}
