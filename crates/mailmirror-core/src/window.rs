//! Search window.
//!
//! The ordered, paginated id list of the active query. The window owns ids
//! only; entities live in the [`Store`](crate::Store).
//!
//! Two tokens keep async completions honest:
//!
//! - every [`begin_query`](SearchWindow::begin_query) bumps a generation, and
//!   a response whose [`QueryTicket`] is from an older generation is dropped
//! - [`begin_append`](SearchWindow::begin_append) hands out the only
//!   [`AppendTicket`] for the query; a second load-more is rejected until the
//!   first one finishes

use mailmirror_wire::ResultType;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{ConversationId, MessageId};

/// Request status of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// A page request is outstanding.
    Pending,
    /// The last page request succeeded.
    Fulfilled,
    /// The last page request failed.
    Error,
}

/// Result ids of one query. A window holds one kind at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "ids", rename_all = "lowercase")]
pub enum WindowIds {
    /// Conversation hits.
    Conversations(Vec<ConversationId>),
    /// Message hits.
    Messages(Vec<MessageId>),
}

impl WindowIds {
    /// Creates an empty list of the given kind.
    #[must_use]
    pub const fn empty(result_type: ResultType) -> Self {
        match result_type {
            ResultType::Conversation => Self::Conversations(Vec::new()),
            ResultType::Message => Self::Messages(Vec::new()),
        }
    }

    /// The kind of id held.
    #[must_use]
    pub const fn result_type(&self) -> ResultType {
        match self {
            Self::Conversations(_) => ResultType::Conversation,
            Self::Messages(_) => ResultType::Message,
        }
    }

    /// Number of ids.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Conversations(ids) => ids.len(),
            Self::Messages(ids) => ids.len(),
        }
    }

    /// Returns true if there are no ids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WindowIds {
    fn default() -> Self {
        Self::empty(ResultType::default())
    }
}

/// Handle for one query submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTicket {
    generation: u64,
}

/// Handle for the single outstanding load-more of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendTicket {
    generation: u64,
    token: u64,
    offset: u32,
}

impl AppendTicket {
    /// Offset to request the next page at.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }
}

/// The active query's paginated result ids.
#[derive(Debug, Clone, Serialize)]
pub struct SearchWindow {
    ids: WindowIds,
    offset: u32,
    more: bool,
    status: Option<RequestStatus>,
    error: Option<String>,
    invalid_query: bool,
    query: Option<String>,
    #[serde(skip)]
    inbox_query: String,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    append_in_flight: Option<u64>,
    #[serde(skip)]
    next_append: u64,
}

impl SearchWindow {
    /// Creates an idle window.
    ///
    /// `inbox_query` is the query that counts as the default inbox view.
    #[must_use]
    pub fn new(inbox_query: impl Into<String>) -> Self {
        Self {
            ids: WindowIds::default(),
            offset: 0,
            more: false,
            status: None,
            error: None,
            invalid_query: false,
            query: None,
            inbox_query: inbox_query.into(),
            generation: 0,
            append_in_flight: None,
            next_append: 0,
        }
    }

    /// Result ids.
    #[must_use]
    pub const fn ids(&self) -> &WindowIds {
        &self.ids
    }

    /// Conversation ids, empty when the window holds messages.
    #[must_use]
    pub fn conversation_ids(&self) -> &[ConversationId] {
        match &self.ids {
            WindowIds::Conversations(ids) => ids,
            WindowIds::Messages(_) => &[],
        }
    }

    /// Message ids, empty when the window holds conversations.
    #[must_use]
    pub fn message_ids(&self) -> &[MessageId] {
        match &self.ids {
            WindowIds::Messages(ids) => ids,
            WindowIds::Conversations(_) => &[],
        }
    }

    /// Number of items already fetched from the server.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Whether the server has more pages.
    #[must_use]
    pub const fn more(&self) -> bool {
        self.more
    }

    /// Request status; `None` when idle.
    #[must_use]
    pub const fn status(&self) -> Option<RequestStatus> {
        self.status
    }

    /// Detail of the last failure.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the server rejected the active query as unparsable.
    #[must_use]
    pub const fn invalid_query(&self) -> bool {
        self.invalid_query
    }

    /// The active query.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Kind of result the active query returns.
    #[must_use]
    pub const fn result_type(&self) -> ResultType {
        self.ids.result_type()
    }

    /// Returns true while a load-more is outstanding.
    #[must_use]
    pub const fn is_loading_more(&self) -> bool {
        self.append_in_flight.is_some()
    }

    /// Returns true if the active query is the default inbox view.
    #[must_use]
    pub fn is_default_inbox_view(&self) -> bool {
        self.query
            .as_deref()
            .is_some_and(|q| q.trim().eq_ignore_ascii_case(self.inbox_query.trim()))
    }

    /// Starts a new query.
    ///
    /// Earlier query and load-more tickets become stale. The ids, offset
    /// and `more` of the previous query are cleared, so nothing can page
    /// past them with the new query.
    pub fn begin_query(&mut self, query: impl Into<String>, result_type: ResultType) -> QueryTicket {
        let query = query.into();
        self.generation += 1;
        self.append_in_flight = None;
        self.status = Some(RequestStatus::Pending);
        self.error = None;
        self.invalid_query = false;
        self.ids = WindowIds::empty(result_type);
        self.offset = 0;
        self.more = false;
        debug!(query = %query, generation = self.generation, "Query pending");
        self.query = Some(query);
        QueryTicket {
            generation: self.generation,
        }
    }

    /// Returns true if `ticket` belongs to the active query.
    #[must_use]
    pub const fn is_current(&self, ticket: &QueryTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Installs the first page of a query.
    ///
    /// Clears the other id kind, sets the offset to the page length and the
    /// status to fulfilled.
    pub fn replace(&mut self, ids: WindowIds, more: bool) {
        let offset = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        self.replace_page(ids, offset, more);
    }

    /// Installs the first page of a query with the server's next offset.
    ///
    /// Use when the page held hits that were dropped on the way in, so the
    /// offset is not the number of ids kept.
    pub fn replace_page(&mut self, ids: WindowIds, offset: u32, more: bool) {
        self.offset = offset;
        self.ids = ids;
        self.more = more;
        self.status = Some(RequestStatus::Fulfilled);
        self.error = None;
        debug!(count = self.ids.len(), more, "Window replaced");
    }

    /// Appends a page.
    ///
    /// Ids already present are skipped. The offset never moves backwards. A
    /// page of the other id kind is ignored.
    pub fn append(&mut self, ids: WindowIds, offset: u32, more: bool) {
        let added = match (&mut self.ids, ids) {
            (WindowIds::Conversations(current), WindowIds::Conversations(new)) => {
                union_into(current, new)
            }
            (WindowIds::Messages(current), WindowIds::Messages(new)) => union_into(current, new),
            _ => {
                warn!("Ignoring page of the wrong result type");
                return;
            }
        };
        self.offset = self.offset.max(offset);
        self.more = more;
        self.status = Some(RequestStatus::Fulfilled);
        self.error = None;
        debug!(added, offset = self.offset, more, "Window appended");
    }

    /// Clears ids, offset and query state.
    ///
    /// Outstanding query and load-more tickets become stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.ids = WindowIds::empty(self.ids.result_type());
        self.offset = 0;
        self.more = false;
        self.status = None;
        self.error = None;
        self.invalid_query = false;
        self.query = None;
        self.append_in_flight = None;
        debug!("Window reset");
    }

    /// Marks the last page request as failed.
    ///
    /// A query parse fault also raises the invalid-query flag.
    pub fn fail(&mut self, error: &Error) {
        self.status = Some(RequestStatus::Error);
        self.error = Some(error.to_string());
        if error.fault().is_some_and(mailmirror_wire::Fault::is_query_parse_error) {
            self.invalid_query = true;
        }
        warn!(error = %error, invalid = self.invalid_query, "Query failed");
    }

    /// Claims the load-more slot of the active query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveQuery`] when nothing has been queried and
    /// [`Error::LoadInFlight`] while another load-more is outstanding.
    pub fn begin_append(&mut self) -> Result<AppendTicket> {
        if self.query.is_none() {
            return Err(Error::NoActiveQuery);
        }
        if self.append_in_flight.is_some() {
            return Err(Error::LoadInFlight);
        }
        self.next_append += 1;
        self.append_in_flight = Some(self.next_append);
        self.status = Some(RequestStatus::Pending);
        Ok(AppendTicket {
            generation: self.generation,
            token: self.next_append,
            offset: self.offset,
        })
    }

    /// Returns true if `ticket` is the outstanding load-more of the active
    /// query.
    #[must_use]
    pub fn owns_append(&self, ticket: &AppendTicket) -> bool {
        ticket.generation == self.generation && self.append_in_flight == Some(ticket.token)
    }

    /// Completes a load-more.
    ///
    /// Returns false and changes nothing when the ticket is stale.
    pub fn finish_append(
        &mut self,
        ticket: AppendTicket,
        ids: WindowIds,
        offset: u32,
        more: bool,
    ) -> bool {
        if !self.release_append(ticket) {
            warn!(offset, "Dropping stale page");
            return false;
        }
        self.append(ids, offset, more);
        true
    }

    /// Abandons a load-more after a failure.
    ///
    /// Returns false when the ticket is stale.
    pub fn abort_append(&mut self, ticket: AppendTicket, error: &Error) -> bool {
        if !self.release_append(ticket) {
            return false;
        }
        self.fail(error);
        true
    }

    /// Drops a conversation id. Returns true if it was present.
    pub fn remove_conversation(&mut self, id: &ConversationId) -> bool {
        match &mut self.ids {
            WindowIds::Conversations(ids) => remove_from(ids, id),
            WindowIds::Messages(_) => false,
        }
    }

    /// Drops a message id. Returns true if it was present.
    pub fn remove_message(&mut self, id: &MessageId) -> bool {
        match &mut self.ids {
            WindowIds::Messages(ids) => remove_from(ids, id),
            WindowIds::Conversations(_) => false,
        }
    }

    /// Puts a conversation id first. Returns false if it was already listed
    /// or the window holds messages.
    pub fn insert_conversation_front(&mut self, id: ConversationId) -> bool {
        match &mut self.ids {
            WindowIds::Conversations(ids) => insert_front(ids, id),
            WindowIds::Messages(_) => false,
        }
    }

    /// Puts a message id first. Returns false if it was already listed or
    /// the window holds conversations.
    pub fn insert_message_front(&mut self, id: MessageId) -> bool {
        match &mut self.ids {
            WindowIds::Messages(ids) => insert_front(ids, id),
            WindowIds::Conversations(_) => false,
        }
    }

    fn release_append(&mut self, ticket: AppendTicket) -> bool {
        if !self.owns_append(&ticket) {
            return false;
        }
        self.append_in_flight = None;
        true
    }
}

impl Default for SearchWindow {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INBOX_QUERY)
    }
}

fn union_into<T: PartialEq>(current: &mut Vec<T>, new: Vec<T>) -> usize {
    let before = current.len();
    for id in new {
        if !current.contains(&id) {
            current.push(id);
        }
    }
    current.len() - before
}

fn remove_from<T: PartialEq>(ids: &mut Vec<T>, id: &T) -> bool {
    let before = ids.len();
    ids.retain(|x| x != id);
    ids.len() != before
}

fn insert_front<T: PartialEq>(ids: &mut Vec<T>, id: T) -> bool {
    if ids.contains(&id) {
        return false;
    }
    ids.insert(0, id);
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailmirror_wire::{Fault, FaultCode};

    use super::*;

    fn convs(ids: &[&str]) -> WindowIds {
        WindowIds::Conversations(ids.iter().map(|id| ConversationId::new(*id)).collect())
    }

    fn msgs(ids: &[&str]) -> WindowIds {
        WindowIds::Messages(ids.iter().map(|id| MessageId::new(*id)).collect())
    }

    #[test]
    fn test_append_monotonicity() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A", "B"]), true);
        assert_eq!(window.offset(), 2);

        window.append(convs(&["C", "D"]), 4, false);
        assert_eq!(window.ids(), &convs(&["A", "B", "C", "D"]));
        assert_eq!(window.offset(), 4);
        assert!(!window.more());

        window.append(convs(&["C", "D"]), 4, false);
        assert_eq!(window.ids(), &convs(&["A", "B", "C", "D"]));
        assert_eq!(window.offset(), 4);

        window.append(convs(&[]), 3, false);
        assert_eq!(window.offset(), 4);
    }

    #[test]
    fn test_replace_clears_other_kind() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A"]), false);

        window.begin_query("from:bob", ResultType::Message);
        assert!(window.conversation_ids().is_empty());
        assert_eq!(window.offset(), 0);
        window.replace(msgs(&["1", "2"]), true);
        assert_eq!(window.message_ids().len(), 2);
        assert_eq!(window.offset(), 2);
        assert_eq!(window.status(), Some(RequestStatus::Fulfilled));
    }

    #[test]
    fn test_invalid_query_lifecycle() {
        let mut window = SearchWindow::default();
        window.begin_query("subject:(", ResultType::Conversation);
        let fault = Fault::new(FaultCode::QueryParseError, "unbalanced");
        window.fail(&Error::from_fault(fault));
        assert_eq!(window.status(), Some(RequestStatus::Error));
        assert!(window.invalid_query());
        assert!(window.error().unwrap().contains("unbalanced"));

        window.reset();
        assert!(!window.invalid_query());
        assert_eq!(window.status(), None);
        assert_eq!(window.offset(), 0);
        assert!(window.ids().is_empty());
    }

    #[test]
    fn test_new_query_starts_from_zero() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A", "B"]), true);

        window.begin_query("subject:(", ResultType::Conversation);
        assert!(window.ids().is_empty());
        assert_eq!(window.offset(), 0);
        assert!(!window.more());

        window.fail(&Error::from_fault(Fault::new(FaultCode::QueryParseError, "unbalanced")));
        assert!(window.ids().is_empty());
        assert_eq!(window.offset(), 0);
    }

    #[test]
    fn test_replace_page_keeps_server_offset() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace_page(convs(&["A"]), 2, true);
        assert_eq!(window.offset(), 2);
        assert_eq!(window.begin_append().unwrap().offset(), 2);
    }

    #[test]
    fn test_transport_failure_is_not_invalid_query() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.fail(&Error::from(mailmirror_wire::Error::Transport("reset".into())));
        assert_eq!(window.status(), Some(RequestStatus::Error));
        assert!(!window.invalid_query());
    }

    #[test]
    fn test_second_append_rejected() {
        let mut window = SearchWindow::default();
        assert!(matches!(window.begin_append(), Err(Error::NoActiveQuery)));

        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A", "B"]), true);

        let ticket = window.begin_append().unwrap();
        assert_eq!(ticket.offset(), 2);
        assert!(matches!(window.begin_append(), Err(Error::LoadInFlight)));

        assert!(window.finish_append(ticket, convs(&["C"]), 3, false));
        assert!(!window.is_loading_more());
        assert!(window.begin_append().is_ok());
    }

    #[test]
    fn test_append_from_old_query_dropped() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A"]), true);
        let ticket = window.begin_append().unwrap();

        let query = window.begin_query("from:bob", ResultType::Conversation);
        assert!(window.is_current(&query));
        assert!(!window.finish_append(ticket, convs(&["Z"]), 2, false));
        assert!(!window.conversation_ids().contains(&ConversationId::new("Z")));
    }

    #[test]
    fn test_remove_and_insert_front() {
        let mut window = SearchWindow::default();
        window.begin_query("in:inbox", ResultType::Conversation);
        window.replace(convs(&["A", "B"]), false);

        assert!(window.remove_conversation(&ConversationId::new("A")));
        assert!(!window.remove_message(&MessageId::new("B")));
        assert!(window.insert_conversation_front(ConversationId::new("N")));
        assert!(!window.insert_conversation_front(ConversationId::new("N")));
        assert_eq!(window.ids(), &convs(&["N", "B"]));
    }

    #[test]
    fn test_default_inbox_view() {
        let mut window = SearchWindow::new("in:inbox");
        assert!(!window.is_default_inbox_view());
        window.begin_query(" IN:INBOX ", ResultType::Conversation);
        assert!(window.is_default_inbox_view());
        window.begin_query("in:inbox is:unread", ResultType::Conversation);
        assert!(!window.is_default_inbox_view());
    }
}
