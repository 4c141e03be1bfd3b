//! Sync engine facade.
//!
//! [`SyncEngine`] owns one [`Store`], one [`SearchWindow`] and one
//! [`Reconciler`] behind a single mutex, plus the host's transport. The lock
//! is never held across an await, so async entry points interleave only at
//! transport calls. The ticket checks in the window and the expansion
//! controller decide what a late completion may still write.

use std::sync::{Mutex, MutexGuard, PoisonError};

use mailmirror_wire::{
    ExpandRequest, MailTransport, ResultType, SearchRequest, SearchResponse, WireNotify,
};
use tracing::{debug, info, warn};

use crate::action::{Action, OptimisticWrite, apply_confirmed};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::expansion::{ExpansionOutcome, ExpansionStatus, begin_expansion, complete_expansion};
use crate::model::{Conversation, ConversationId, Message, MessageId, TagCatalog};
use crate::normalize::{normalize_conversation, normalize_message};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::store::{MergePolicy, Store};
use crate::window::{SearchWindow, WindowIds};

/// What a page request did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page landed in the window.
    Applied {
        /// Hits on the page.
        hits: usize,
        /// Whether more pages exist.
        more: bool,
    },
    /// A newer query or reset superseded the request; nothing was written.
    Stale,
    /// The server reported no further pages; nothing was requested.
    Exhausted,
}

#[derive(Debug)]
struct EngineState {
    store: Store,
    window: SearchWindow,
    reconciler: Reconciler,
}

/// Client-side mirror of a remote mailbox.
#[derive(Debug)]
pub struct SyncEngine<T> {
    transport: T,
    config: SyncConfig,
    state: Mutex<EngineState>,
}

impl<T: MailTransport> SyncEngine<T> {
    /// Creates an engine with an empty store.
    #[must_use]
    pub fn new(transport: T, config: SyncConfig) -> Self {
        let state = EngineState {
            store: Store::new(),
            window: SearchWindow::new(config.inbox_query.clone()),
            reconciler: Reconciler::new(config.inbox_folder.clone()),
        };
        Self {
            transport,
            config,
            state: Mutex::new(state),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Replaces the tag catalog used to resolve tag names.
    pub fn set_tags(&self, tags: TagCatalog) {
        self.lock().store.set_tags(tags);
    }

    /// Runs a query and installs its first page.
    ///
    /// An empty query resets the window. Resubmitting a query the server
    /// already rejected as unparsable fails without a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for a query parse fault, any other
    /// fault as [`Error::Fault`], and transport failures as [`Error::Wire`].
    /// The window records the failure in every case.
    pub async fn search(&self, query: &str) -> Result<PageOutcome> {
        let query = query.trim();
        if query.is_empty() {
            self.lock().window.reset();
            return Ok(PageOutcome::Applied {
                hits: 0,
                more: false,
            });
        }
        {
            let state = self.lock();
            if state.window.invalid_query() && state.window.query() == Some(query) {
                debug!(query, "Refusing to resubmit invalid query");
                return Err(invalid_query(&state.window));
            }
        }
        self.first_page(query).await
    }

    /// Fetches the next page of the active query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoadInFlight`] while another load-more is
    /// outstanding, [`Error::NoActiveQuery`] before the first search,
    /// [`Error::InvalidQuery`] without a request when the server rejected the
    /// active query, and request failures as in [`search`](Self::search).
    pub async fn load_more(&self) -> Result<PageOutcome> {
        let (ticket, request) = {
            let mut state = self.lock();
            if state.window.invalid_query() {
                debug!("Refusing to page an invalid query");
                return Err(invalid_query(&state.window));
            }
            if state.window.query().is_some() && !state.window.more() {
                return Ok(PageOutcome::Exhausted);
            }
            let ticket = state.window.begin_append()?;
            let query = state.window.query().unwrap_or_default().to_string();
            let request = self.search_request(query, state.window.result_type(), ticket.offset());
            (ticket, request)
        };
        debug!(offset = ticket.offset(), "Loading more");

        let response = self.transport.search(request).await;

        let mut state = self.lock();
        let state = &mut *state;
        if !state.window.owns_append(&ticket) {
            warn!(offset = ticket.offset(), "Dropping page for superseded query");
            return Ok(PageOutcome::Stale);
        }
        let response = match checked(response) {
            Ok(response) => response,
            Err(err) => {
                state.window.abort_append(ticket, &err);
                return Err(err);
            }
        };
        let more = response.more;
        let result_type = state.window.result_type();
        let offset = response.next_offset(ticket.offset(), result_type);
        let ids = ingest(&mut state.store, response, result_type);
        let hits = ids.len();
        state.window.finish_append(ticket, ids, offset, more);
        Ok(PageOutcome::Applied { hits, more })
    }

    /// Expands a conversation, fetching its full message list once.
    ///
    /// A conversation that is not loaded, or whose expansion is already
    /// pending or settled, is not fetched; its current status is returned.
    ///
    /// # Errors
    ///
    /// Returns the transport failure or fault that put the conversation in
    /// [`ExpansionStatus::Error`].
    pub async fn expand_conversation(&self, id: &ConversationId) -> Result<ExpansionStatus> {
        let (ticket, folder_hint) = {
            let mut state = self.lock();
            let Some(ticket) = begin_expansion(&mut state.store, id) else {
                return Ok(state.store.expansion_status(id));
            };
            let hint = state
                .store
                .conversation(id)
                .and_then(|c| c.messages.first())
                .map(|m| m.folder_id.clone())
                .filter(|f| !f.as_str().is_empty());
            (ticket, hint)
        };

        let mut request = ExpandRequest::new(id.as_str()).fetch(self.config.fetch_mode);
        if let Some(folder) = folder_hint {
            request = request.folder_hint(folder.as_str());
        }
        let result = match self.transport.expand(request).await {
            Ok(response) => response.into_messages().map_err(Error::from_fault),
            Err(err) => Err(Error::Wire(err)),
        };

        let mut state = self.lock();
        match result {
            Ok(messages) => {
                complete_expansion(&mut state.store, &ticket, Ok(messages));
                Ok(state.store.expansion_status(id))
            }
            Err(err) => match complete_expansion(&mut state.store, &ticket, Err(&err)) {
                ExpansionOutcome::Stale => Ok(state.store.expansion_status(id)),
                _ => Err(err),
            },
        }
    }

    /// Applies a push notification batch.
    ///
    /// A batch that breaks sequence order triggers a resync: the active
    /// query is re-run, every expansion is invalidated and the reconciler is
    /// rebased.
    ///
    /// # Errors
    ///
    /// Returns the resync's request failure. The reconciler then keeps
    /// discarding batches until [`resync`](Self::resync) succeeds.
    pub async fn handle_notify(&self, notify: &WireNotify) -> Result<ReconcileOutcome> {
        let outcome = {
            let mut state = self.lock();
            let state = &mut *state;
            state
                .reconciler
                .apply_delta(&mut state.store, &mut state.window, notify)
        };
        if let ReconcileOutcome::ResyncRequired(reason) = outcome {
            info!(%reason, "Resyncing visible query");
            self.resync().await?;
        }
        Ok(outcome)
    }

    /// Reloads the visible query and rebases the reconciler.
    ///
    /// # Errors
    ///
    /// Returns the request failure of the reload.
    pub async fn resync(&self) -> Result<()> {
        let query = {
            let mut state = self.lock();
            state.store.invalidate_all_expansions();
            state.window.query().map(str::to_string)
        };
        if let Some(query) = query {
            self.first_page(&query).await?;
        }
        self.lock().reconciler.finish_resync();
        Ok(())
    }

    /// Performs a user action.
    ///
    /// Optimistic ops patch the store first; the patches are rolled back if
    /// the server rejects the action. A confirmed delete removes the targets.
    ///
    /// # Errors
    ///
    /// Returns the fault or transport failure that caused a rollback.
    pub async fn perform(&self, action: Action) -> Result<()> {
        let write = OptimisticWrite::apply(&action, &mut self.lock().store);
        let request = action.to_request();
        debug!(op = ?request.op, ids = request.ids.len(), "Performing action");

        let result = match self.transport.action(request).await {
            Ok(response) => response.fault.map_or(Ok(()), |f| Err(Error::from_fault(f))),
            Err(err) => Err(Error::Wire(err)),
        };

        let mut state = self.lock();
        let state = &mut *state;
        match result {
            Ok(()) => {
                write.commit(&mut state.store);
                apply_confirmed(&action, &mut state.store, &mut state.window);
                Ok(())
            }
            Err(err) => {
                warn!(op = ?action.op.code(), error = %err, "Action failed");
                write.rollback(&mut state.store);
                Err(err)
            }
        }
    }

    /// Returns a copy of a loaded message.
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.lock().store.message(id).cloned()
    }

    /// Returns a copy of a loaded conversation.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.lock().store.conversation(id).cloned()
    }

    /// Returns the expansion status of a conversation.
    #[must_use]
    pub fn expansion_status(&self, id: &ConversationId) -> ExpansionStatus {
        self.lock().store.expansion_status(id)
    }

    /// Returns a copy of the search window.
    #[must_use]
    pub fn window_snapshot(&self) -> SearchWindow {
        self.lock().window.clone()
    }

    /// Returns the loaded conversations of the window, in window order.
    #[must_use]
    pub fn visible_conversations(&self) -> Vec<Conversation> {
        let state = self.lock();
        state
            .window
            .conversation_ids()
            .iter()
            .filter_map(|id| state.store.conversation(id).cloned())
            .collect()
    }

    /// Returns the loaded messages of the window, in window order.
    #[must_use]
    pub fn visible_messages(&self) -> Vec<Message> {
        let state = self.lock();
        state
            .window
            .message_ids()
            .iter()
            .filter_map(|id| state.store.message(id).cloned())
            .collect()
    }

    /// Returns true while the reconciler is waiting for a resync.
    #[must_use]
    pub fn resync_pending(&self) -> bool {
        self.lock().reconciler.resync_pending()
    }

    /// Runs `f` against the store and window under one lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Store, &SearchWindow) -> R) -> R {
        let state = self.lock();
        f(&state.store, &state.window)
    }

    async fn first_page(&self, query: &str) -> Result<PageOutcome> {
        let result_type = self.config.result_type;
        let ticket = self.lock().window.begin_query(query, result_type);
        let request = self.search_request(query.to_string(), result_type, 0);

        let response = self.transport.search(request).await;

        let mut state = self.lock();
        let state = &mut *state;
        if !state.window.is_current(&ticket) {
            warn!(query, "Dropping response for superseded query");
            return Ok(PageOutcome::Stale);
        }
        let response = match checked(response) {
            Ok(response) => response,
            Err(err) => {
                state.window.fail(&err);
                return Err(err);
            }
        };
        let more = response.more;
        let offset = response.next_offset(0, result_type);
        let ids = ingest(&mut state.store, response, result_type);
        let hits = ids.len();
        state.window.replace_page(ids, offset, more);
        info!(query, hits, more, "Query completed");
        Ok(PageOutcome::Applied { hits, more })
    }

    fn search_request(&self, query: String, result_type: ResultType, offset: u32) -> SearchRequest {
        let mut request = SearchRequest::new(query, result_type)
            .offset(offset)
            .limit(self.config.page_size)
            .sort(self.config.sort);
        if let Some(locale) = &self.config.locale {
            request = request.locale(locale.clone());
        }
        request
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The error a rejected query keeps answering with.
fn invalid_query(window: &SearchWindow) -> Error {
    Error::from_fault(mailmirror_wire::Fault::new(
        mailmirror_wire::FaultCode::QueryParseError,
        window.error().unwrap_or_default(),
    ))
}

/// Splits a fault out of an otherwise successful response.
fn checked(response: mailmirror_wire::Result<SearchResponse>) -> Result<SearchResponse> {
    let mut response = response?;
    match response.fault.take() {
        Some(fault) => Err(Error::from_fault(fault)),
        None => Ok(response),
    }
}

/// Normalizes a search page into the store and returns the hit ids.
///
/// Hits are merged so a complete message or an expanded conversation keeps
/// what the hit does not carry.
fn ingest(store: &mut Store, response: SearchResponse, result_type: ResultType) -> WindowIds {
    let conversations: Vec<Conversation> = response
        .conversations
        .iter()
        .map(|wire| normalize_conversation(wire, store.tags()))
        .filter(|c| !c.id.as_str().is_empty())
        .collect();
    let messages: Vec<Message> = response
        .messages
        .iter()
        .map(|wire| normalize_message(wire, false))
        .filter(|m| !m.id.as_str().is_empty())
        .collect();
    let skipped = response.conversations.len() + response.messages.len()
        - conversations.len()
        - messages.len();
    if skipped > 0 {
        warn!(skipped, "Skipping search hits without id");
    }

    let ids = match result_type {
        ResultType::Conversation => {
            WindowIds::Conversations(conversations.iter().map(|c| c.id.clone()).collect())
        }
        ResultType::Message => WindowIds::Messages(messages.iter().map(|m| m.id.clone()).collect()),
    };
    store.upsert_conversations(conversations, MergePolicy::Merge);
    store.upsert_messages(messages, MergePolicy::Merge);
    ids
}
