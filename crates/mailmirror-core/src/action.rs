//! Action layer.
//!
//! User actions become one remote mutation each. Reversible ops (flag, read,
//! move, trash, spam, tag) patch the store before the call returns; the rest
//! wait for confirmation.
//!
//! Every optimistic patch is recorded in the store's ledger with a fresh
//! version next to a snapshot of the fields it overwrote. On failure a
//! snapshot is restored only while its version is still the latest mark on
//! that entity, so a newer action or a delta that already rewrote the
//! entity is never clobbered by a rollback.

use mailmirror_wire::{ActionOp, ActionRequest};
use tracing::{debug, warn};

use crate::model::{
    Conversation, ConversationId, ConversationPatch, FolderId, Message, MessageId, MessagePatch,
    TagId,
};
use crate::reconcile::purge_id;
use crate::store::{OptimisticKey, Store};
use crate::window::SearchWindow;

/// What an action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    /// Individual messages.
    Messages(Vec<MessageId>),
    /// Whole conversations.
    Conversations(Vec<ConversationId>),
}

impl ActionTarget {
    fn ids(&self) -> Vec<String> {
        match self {
            Self::Messages(ids) => ids.iter().map(|id| id.as_str().to_string()).collect(),
            Self::Conversations(ids) => ids.iter().map(|id| id.as_str().to_string()).collect(),
        }
    }
}

/// A mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Set the flagged flag.
    Flag,
    /// Clear the flagged flag.
    Unflag,
    /// Mark read.
    Read,
    /// Mark unread.
    Unread,
    /// Move to a folder.
    Move(FolderId),
    /// Move to trash.
    Trash,
    /// Report as spam.
    Spam,
    /// Report as not spam; returns the item to the inbox.
    NotSpam,
    /// Add a tag by name.
    Tag(String),
    /// Remove a tag by name.
    Untag(String),
    /// Delete permanently.
    Delete,
    /// Redirect to other recipients.
    Redirect(Vec<String>),
    /// Send a saved draft.
    SendDraft,
}

impl Operation {
    /// The wire operation code.
    #[must_use]
    pub const fn code(&self) -> ActionOp {
        match self {
            Self::Flag => ActionOp::Flag,
            Self::Unflag => ActionOp::Unflag,
            Self::Read => ActionOp::Read,
            Self::Unread => ActionOp::Unread,
            Self::Move(_) => ActionOp::Move,
            Self::Trash => ActionOp::Trash,
            Self::Spam => ActionOp::Spam,
            Self::NotSpam => ActionOp::NotSpam,
            Self::Tag(_) => ActionOp::Tag,
            Self::Untag(_) => ActionOp::Untag,
            Self::Delete => ActionOp::Delete,
            Self::Redirect(_) => ActionOp::Redirect,
            Self::SendDraft => ActionOp::SendDraft,
        }
    }

    /// Returns true if the store is patched before confirmation.
    #[must_use]
    pub const fn is_optimistic(&self) -> bool {
        !matches!(self, Self::Delete | Self::Redirect(_) | Self::SendDraft)
    }

    fn message_patch(&self, message: &Message, tags: Option<&TagId>) -> Option<MessagePatch> {
        let mut patch = MessagePatch::new(message.id.clone());
        let mut flags = message.flags;
        match self {
            Self::Flag | Self::Unflag => {
                flags.flagged = matches!(self, Self::Flag);
                patch.flags = Some(flags);
            }
            Self::Read | Self::Unread => {
                flags.read = matches!(self, Self::Read);
                patch.flags = Some(flags);
            }
            Self::Move(folder) => patch.folder_id = Some(folder.clone()),
            Self::Trash => patch.folder_id = Some(FolderId::trash()),
            Self::Spam => patch.folder_id = Some(FolderId::junk()),
            Self::NotSpam => patch.folder_id = Some(FolderId::inbox()),
            Self::Tag(_) | Self::Untag(_) => {
                patch.tags = Some(edit_tags(&message.tags, tags?, matches!(self, Self::Tag(_))));
            }
            Self::Delete | Self::Redirect(_) | Self::SendDraft => return None,
        }
        Some(patch)
    }

    fn conversation_patch(
        &self,
        conversation: &Conversation,
        tags: Option<&TagId>,
    ) -> Option<ConversationPatch> {
        let mut patch = ConversationPatch::new(conversation.id.clone());
        match self {
            Self::Flag | Self::Unflag => patch.flagged = Some(matches!(self, Self::Flag)),
            Self::Read => patch.unread_count = Some(0),
            Self::Unread => {
                patch.unread_count = Some(conversation.messages_in_conversation.max(1));
            }
            Self::Tag(_) | Self::Untag(_) => {
                patch.tags = Some(edit_tags(
                    &conversation.tags,
                    tags?,
                    matches!(self, Self::Tag(_)),
                ));
            }
            // Folder moves live on the messages.
            Self::Move(_)
            | Self::Trash
            | Self::Spam
            | Self::NotSpam
            | Self::Delete
            | Self::Redirect(_)
            | Self::SendDraft => return None,
        }
        Some(patch)
    }
}

/// A user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Target ids.
    pub target: ActionTarget,
    /// Operation.
    pub op: Operation,
}

/// Patches an action would apply before confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimisticPatches {
    /// Message patches.
    pub messages: Vec<MessagePatch>,
    /// Conversation patches.
    pub conversations: Vec<ConversationPatch>,
}

impl OptimisticPatches {
    /// Returns true if nothing would be patched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.conversations.is_empty()
    }
}

impl Action {
    /// Creates an action on messages.
    #[must_use]
    pub fn messages(ids: impl IntoIterator<Item = MessageId>, op: Operation) -> Self {
        Self {
            target: ActionTarget::Messages(ids.into_iter().collect()),
            op,
        }
    }

    /// Creates an action on conversations.
    #[must_use]
    pub fn conversations(ids: impl IntoIterator<Item = ConversationId>, op: Operation) -> Self {
        Self {
            target: ActionTarget::Conversations(ids.into_iter().collect()),
            op,
        }
    }

    /// Builds the wire request.
    #[must_use]
    pub fn to_request(&self) -> ActionRequest {
        let ids = self.target.ids();
        let code = self.op.code();
        let mut request = match self.target {
            ActionTarget::Messages(_) => ActionRequest::messages(code, ids),
            ActionTarget::Conversations(_) => ActionRequest::conversations(code, ids),
        };
        match &self.op {
            Operation::Move(folder) => request.folder_id = Some(folder.as_str().to_string()),
            Operation::Tag(name) | Operation::Untag(name) => request.tag_name = Some(name.clone()),
            Operation::Redirect(addresses) => request.addresses.clone_from(addresses),
            _ => {}
        }
        request
    }

    /// Computes the optimistic patches against the loaded entities.
    ///
    /// Targets that are not loaded are skipped. A conversation target also
    /// patches each of its loaded messages. Tag ops on a name the catalog
    /// does not know yield nothing.
    #[must_use]
    pub fn optimistic_patches(&self, store: &Store) -> OptimisticPatches {
        let mut patches = OptimisticPatches::default();
        if !self.op.is_optimistic() {
            return patches;
        }
        let tag = match &self.op {
            Operation::Tag(name) | Operation::Untag(name) => store.tags().id_for_name(name),
            _ => None,
        };

        match &self.target {
            ActionTarget::Messages(ids) => {
                patches.messages = ids
                    .iter()
                    .filter_map(|id| store.message(id))
                    .filter_map(|m| self.op.message_patch(m, tag))
                    .collect();
            }
            ActionTarget::Conversations(ids) => {
                for conversation in ids.iter().filter_map(|id| store.conversation(id)) {
                    patches
                        .conversations
                        .extend(self.op.conversation_patch(conversation, tag));
                    patches.messages.extend(
                        conversation
                            .messages
                            .iter()
                            .filter_map(|m| store.message(&m.id))
                            .filter_map(|m| self.op.message_patch(m, tag)),
                    );
                }
            }
        }
        patches
    }
}

fn edit_tags(current: &[TagId], tag: &TagId, add: bool) -> Vec<TagId> {
    let mut tags: Vec<TagId> = current.iter().filter(|t| *t != tag).cloned().collect();
    if add {
        tags.push(tag.clone());
    }
    tags
}

#[derive(Debug, Clone)]
enum Undo {
    Message(MessagePatch),
    Conversation(ConversationPatch),
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    key: OptimisticKey,
    version: u64,
    undo: Undo,
}

/// The optimistic writes of one in-flight action.
///
/// Settle it with [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// once the remote call returns.
#[derive(Debug, Default)]
#[must_use]
pub struct OptimisticWrite {
    entries: Vec<LedgerEntry>,
}

impl OptimisticWrite {
    /// Applies an action's optimistic patches, recording undo snapshots.
    pub fn apply(action: &Action, store: &mut Store) -> Self {
        let patches = action.optimistic_patches(store);
        let mut entries = Vec::new();

        for patch in patches.messages {
            let Some(undo) = store.message(&patch.id).map(|m| m.snapshot_for(&patch)) else {
                continue;
            };
            let key = OptimisticKey::Message(patch.id.clone());
            let version = store.mark_optimistic(key.clone());
            store.patch_messages([patch]);
            entries.push(LedgerEntry {
                key,
                version,
                undo: Undo::Message(undo),
            });
        }
        for patch in patches.conversations {
            let Some(undo) = store
                .conversation(&patch.id)
                .map(|c| c.snapshot_for(&patch))
            else {
                continue;
            };
            let key = OptimisticKey::Conversation(patch.id.clone());
            let version = store.mark_optimistic(key.clone());
            store.patch_conversations([patch]);
            entries.push(LedgerEntry {
                key,
                version,
                undo: Undo::Conversation(undo),
            });
        }

        debug!(op = ?action.op.code(), patched = entries.len(), "Optimistic write applied");
        Self { entries }
    }

    /// Number of entities patched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was patched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the ledger marks this write still owns.
    pub fn commit(self, store: &mut Store) {
        for entry in self.entries {
            store.clear_optimistic_if(&entry.key, entry.version);
        }
    }

    /// Restores snapshots whose ledger mark is still this write's.
    ///
    /// Returns the number restored.
    pub fn rollback(self, store: &mut Store) -> usize {
        let mut restored = 0;
        for entry in self.entries {
            if !store.clear_optimistic_if(&entry.key, entry.version) {
                debug!(key = ?entry.key, "Skipping rollback of superseded write");
                continue;
            }
            match entry.undo {
                Undo::Message(patch) => {
                    store.patch_messages([patch]);
                }
                Undo::Conversation(patch) => {
                    store.patch_conversations([patch]);
                }
            }
            restored += 1;
        }
        if restored > 0 {
            warn!(restored, "Rolled back optimistic write");
        }
        restored
    }
}

/// Applies the store effects of a confirmed action.
///
/// Only deletes change anything here; every other op is either optimistic
/// already or waits for its delta.
pub fn apply_confirmed(action: &Action, store: &mut Store, window: &mut SearchWindow) -> usize {
    if action.op != Operation::Delete {
        return 0;
    }
    let removed = action
        .target
        .ids()
        .iter()
        .filter(|id| purge_id(store, window, id))
        .count();
    debug!(removed, "Confirmed delete applied");
    removed
}
