//! Recorded session files and the transport that replays them.
//!
//! A session is a JSON document holding the server's recorded answers and
//! the ordered list of steps to drive through the engine:
//!
//! ```json
//! {
//!   "tags": [{"id": "64", "name": "work"}],
//!   "searches": [{"c": [{"id": "123", "m": [{"id": "1"}]}], "more": false}],
//!   "expansions": {"123": [{"c": {"id": "123", "m": [{"id": "1"}, {"id": "2"}]}}]},
//!   "actions": [{"ids": ["1"]}],
//!   "steps": [
//!     {"step": "search", "query": "in:inbox"},
//!     {"step": "expand", "conversation": "123"},
//!     {"step": "action", "op": "read", "messages": ["1"]},
//!     {"step": "notify", "notify": {"seq": 1, "deleted": {"id": "2"}}}
//!   ]
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use mailmirror_core::{
    Action, ConversationId, FolderId, MessageId, Operation, Tag, TagCatalog,
};
use mailmirror_wire::{
    ActionOp, ActionRequest, ActionResponse, ExpandRequest, ExpandResponse, MailTransport,
    SearchRequest, SearchResponse, WireNotify,
};
use serde::Deserialize;
use tracing::debug;

/// A recorded session.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Tag catalog of the mailbox.
    pub tags: Vec<Tag>,
    /// Search responses, answered in order.
    pub searches: Vec<SearchResponse>,
    /// Expansion responses per conversation id, answered in order.
    pub expansions: HashMap<String, Vec<ExpandResponse>>,
    /// Action responses, answered in order.
    pub actions: Vec<ActionResponse>,
    /// Steps to drive through the engine.
    pub steps: Vec<Step>,
}

impl Session {
    /// Reads a session file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        let session: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session {}", path.display()))?;
        debug!(
            path = %path.display(),
            steps = session.steps.len(),
            searches = session.searches.len(),
            "Loaded session"
        );
        Ok(session)
    }

    /// Splits the session into the replay transport, the tag catalog and the steps.
    pub fn into_parts(self) -> (ReplayTransport, TagCatalog, Vec<Step>) {
        let transport = ReplayTransport::new(self.searches, self.expansions, self.actions);
        let tags = self.tags.into_iter().collect();
        (transport, tags, self.steps)
    }
}

/// One thing to do to the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Run a query.
    Search {
        /// Query string.
        query: String,
    },
    /// Fetch the next page of the active query.
    LoadMore,
    /// Expand a conversation.
    Expand {
        /// Conversation id.
        conversation: String,
    },
    /// Feed one notification batch.
    Notify {
        /// The batch.
        notify: WireNotify,
    },
    /// Perform an action.
    Action(ActionStep),
    /// Force a resync.
    Resync,
}

impl Step {
    /// Short name used in reports.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::LoadMore => "load_more",
            Self::Expand { .. } => "expand",
            Self::Notify { .. } => "notify",
            Self::Action(_) => "action",
            Self::Resync => "resync",
        }
    }
}

/// An action step, in wire vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionStep {
    /// Operation code.
    pub op: ActionOp,
    /// Target message ids.
    #[serde(default)]
    pub messages: Vec<String>,
    /// Target conversation ids.
    #[serde(default)]
    pub conversations: Vec<String>,
    /// Destination folder for `move`.
    #[serde(default)]
    pub folder: Option<String>,
    /// Tag name for `tag` and `!tag`.
    #[serde(default)]
    pub tag: Option<String>,
    /// Recipients for `redirect`.
    #[serde(default)]
    pub to: Vec<String>,
}

impl ActionStep {
    /// Builds the engine action.
    pub fn to_action(&self) -> Result<Action> {
        let op = match self.op {
            ActionOp::Flag => Operation::Flag,
            ActionOp::Unflag => Operation::Unflag,
            ActionOp::Read => Operation::Read,
            ActionOp::Unread => Operation::Unread,
            ActionOp::Move => {
                let folder = self.folder.as_deref().context("move needs a folder")?;
                Operation::Move(FolderId::new(folder))
            }
            ActionOp::Trash => Operation::Trash,
            ActionOp::Spam => Operation::Spam,
            ActionOp::NotSpam => Operation::NotSpam,
            ActionOp::Tag => Operation::Tag(self.tag.clone().context("tag needs a tag name")?),
            ActionOp::Untag => {
                Operation::Untag(self.tag.clone().context("!tag needs a tag name")?)
            }
            ActionOp::Delete => Operation::Delete,
            ActionOp::Redirect => {
                if self.to.is_empty() {
                    bail!("redirect needs at least one recipient");
                }
                Operation::Redirect(self.to.clone())
            }
            ActionOp::SendDraft => Operation::SendDraft,
        };

        match (self.messages.is_empty(), self.conversations.is_empty()) {
            (false, true) => Ok(Action::messages(
                self.messages.iter().map(MessageId::new),
                op,
            )),
            (true, false) => Ok(Action::conversations(
                self.conversations.iter().map(ConversationId::new),
                op,
            )),
            _ => bail!("action needs either messages or conversations, not both or neither"),
        }
    }
}

/// Answers engine calls from recorded responses.
///
/// Every queue is consumed front to back. A call with nothing left to answer
/// fails as a transport error, the same way a dropped connection would.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    searches: Mutex<VecDeque<SearchResponse>>,
    expansions: Mutex<HashMap<String, VecDeque<ExpandResponse>>>,
    actions: Mutex<VecDeque<ActionResponse>>,
    requests: Mutex<Vec<String>>,
}

impl ReplayTransport {
    /// Creates a transport over recorded responses.
    pub fn new(
        searches: Vec<SearchResponse>,
        expansions: HashMap<String, Vec<ExpandResponse>>,
        actions: Vec<ActionResponse>,
    ) -> Self {
        Self {
            searches: Mutex::new(searches.into()),
            expansions: Mutex::new(
                expansions
                    .into_iter()
                    .map(|(id, responses)| (id, responses.into()))
                    .collect(),
            ),
            actions: Mutex::new(actions.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of recorded responses nothing asked for.
    pub fn remaining(&self) -> usize {
        lock(&self.searches).len()
            + lock(&self.expansions).values().map(VecDeque::len).sum::<usize>()
            + lock(&self.actions).len()
    }

    /// One line per request the engine made, in order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    fn record(&self, line: String) {
        lock(&self.requests).push(line);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn exhausted(call: &str) -> mailmirror_wire::Error {
    mailmirror_wire::Error::Transport(format!("session has no recorded {call} response"))
}

impl MailTransport for ReplayTransport {
    async fn search(&self, request: SearchRequest) -> mailmirror_wire::Result<SearchResponse> {
        debug!(query = %request.query, offset = request.offset, "Replaying search");
        self.record(format!("search {:?} offset={}", request.query, request.offset));
        lock(&self.searches)
            .pop_front()
            .ok_or_else(|| exhausted("search"))
    }

    async fn expand(&self, request: ExpandRequest) -> mailmirror_wire::Result<ExpandResponse> {
        debug!(conversation = %request.conversation_id, "Replaying expansion");
        self.record(format!("expand {}", request.conversation_id));
        lock(&self.expansions)
            .get_mut(&request.conversation_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| exhausted("expansion"))
    }

    async fn action(&self, request: ActionRequest) -> mailmirror_wire::Result<ActionResponse> {
        debug!(op = ?request.op, ids = request.ids.len(), "Replaying action");
        self.record(format!("action {:?} {}", request.op, request.ids.join(",")));
        lock(&self.actions)
            .pop_front()
            .ok_or_else(|| exhausted("action"))
    }
}
