//! Request and response shapes for the three remote calls.

use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::types::{WireConversation, WireMessage};

/// Default page size for search requests.
pub const DEFAULT_LIMIT: u32 = 100;

/// Which entity a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Conversation hits.
    #[default]
    Conversation,
    /// Message hits.
    Message,
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    #[serde(rename = "dateDesc")]
    DateDesc,
    /// Oldest first.
    #[serde(rename = "dateAsc")]
    DateAsc,
    /// Subject A-Z.
    #[serde(rename = "subjAsc")]
    SubjectAsc,
    /// Subject Z-A.
    #[serde(rename = "subjDesc")]
    SubjectDesc,
}

/// How many messages of a conversation to fetch in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Every message.
    #[default]
    All,
    /// Only unread messages.
    Unread,
    /// Only the first message.
    First,
}

/// A search page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query string.
    pub query: String,
    /// Result type.
    #[serde(rename = "types")]
    pub result_type: ResultType,
    /// Sort order.
    #[serde(rename = "sortBy")]
    pub sort: SortOrder,
    /// Number of hits to skip.
    pub offset: u32,
    /// Page size.
    pub limit: u32,
    /// Locale used for query parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl SearchRequest {
    /// Creates a first-page request with default sort and limit.
    #[must_use]
    pub fn new(query: impl Into<String>, result_type: ResultType) -> Self {
        Self {
            query: query.into(),
            result_type,
            sort: SortOrder::default(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            locale: None,
        }
    }

    /// Sets the offset.
    #[must_use]
    pub const fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub const fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// A search page response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Conversation hits.
    #[serde(default, rename = "c")]
    pub conversations: Vec<WireConversation>,
    /// Message hits.
    #[serde(default, rename = "m")]
    pub messages: Vec<WireMessage>,
    /// Whether more pages exist.
    #[serde(default)]
    pub more: bool,
    /// Offset the server answered for.
    #[serde(default)]
    pub offset: Option<u32>,
    /// Application fault, if the query was rejected.
    #[serde(default, rename = "Fault")]
    pub fault: Option<Fault>,
}

impl SearchResponse {
    /// Offset of the page after this one.
    ///
    /// Counts every hit of `result_type` the server sent, starting from the
    /// offset it answered for, or from `requested` when it did not say.
    #[must_use]
    pub fn next_offset(&self, requested: u32, result_type: ResultType) -> u32 {
        let hits = match result_type {
            ResultType::Conversation => self.conversations.len(),
            ResultType::Message => self.messages.len(),
        };
        self.offset
            .unwrap_or(requested)
            .saturating_add(u32::try_from(hits).unwrap_or(u32::MAX))
    }
}

/// A conversation expansion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRequest {
    /// Conversation id.
    #[serde(rename = "cid")]
    pub conversation_id: String,
    /// Fetch mode.
    pub fetch: FetchMode,
    /// Folder the conversation is being shown from.
    #[serde(default, rename = "l", skip_serializing_if = "Option::is_none")]
    pub folder_hint: Option<String>,
}

impl ExpandRequest {
    /// Creates a request fetching every message.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            fetch: FetchMode::All,
            folder_hint: None,
        }
    }

    /// Sets the fetch mode.
    #[must_use]
    pub const fn fetch(mut self, fetch: FetchMode) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the folder hint.
    #[must_use]
    pub fn folder_hint(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_hint = Some(folder_id.into());
        self
    }
}

/// A conversation expansion response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandResponse {
    /// The conversation with its messages.
    #[serde(default, rename = "c")]
    pub conversation: Option<WireConversation>,
    /// Application fault, if the expansion was rejected.
    #[serde(default, rename = "Fault")]
    pub fault: Option<Fault>,
}

impl ExpandResponse {
    /// Wraps a list of fully fetched messages.
    #[must_use]
    pub fn with_messages(conversation_id: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            conversation: Some(WireConversation {
                id: Some(conversation_id.into()),
                messages,
                ..WireConversation::default()
            }),
            fault: None,
        }
    }

    /// Wraps a fault.
    #[must_use]
    pub const fn with_fault(fault: Fault) -> Self {
        Self {
            conversation: None,
            fault: Some(fault),
        }
    }

    /// Consumes the response, yielding the messages or the fault.
    ///
    /// # Errors
    ///
    /// Returns the fault carried in the body.
    pub fn into_messages(self) -> Result<Vec<WireMessage>, Fault> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.conversation.map(|c| c.messages).unwrap_or_default()),
        }
    }
}

/// Operation code of a mutating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOp {
    /// Set the flagged flag.
    #[serde(rename = "flag")]
    Flag,
    /// Clear the flagged flag.
    #[serde(rename = "!flag")]
    Unflag,
    /// Mark read.
    #[serde(rename = "read")]
    Read,
    /// Mark unread.
    #[serde(rename = "!read")]
    Unread,
    /// Move to a folder.
    #[serde(rename = "move")]
    Move,
    /// Move to the trash folder.
    #[serde(rename = "trash")]
    Trash,
    /// Report as spam.
    #[serde(rename = "spam")]
    Spam,
    /// Report as not spam.
    #[serde(rename = "!spam")]
    NotSpam,
    /// Add a tag.
    #[serde(rename = "tag")]
    Tag,
    /// Remove a tag.
    #[serde(rename = "!tag")]
    Untag,
    /// Delete permanently.
    #[serde(rename = "delete")]
    Delete,
    /// Redirect to other recipients.
    #[serde(rename = "redirect")]
    Redirect,
    /// Send a saved draft.
    #[serde(rename = "sendDraft")]
    SendDraft,
}

/// A mutating action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Operation code.
    pub op: ActionOp,
    /// Target ids.
    pub ids: Vec<String>,
    /// Whether the ids are conversation ids.
    #[serde(default)]
    pub conversation: bool,
    /// Destination folder for moves.
    #[serde(default, rename = "l", skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Tag name for tag operations.
    #[serde(default, rename = "tn", skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Recipients for redirects.
    #[serde(default, rename = "e", skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
}

impl ActionRequest {
    /// Creates a request on message ids.
    #[must_use]
    pub const fn messages(op: ActionOp, ids: Vec<String>) -> Self {
        Self {
            op,
            ids,
            conversation: false,
            folder_id: None,
            tag_name: None,
            addresses: Vec::new(),
        }
    }

    /// Creates a request on conversation ids.
    #[must_use]
    pub const fn conversations(op: ActionOp, ids: Vec<String>) -> Self {
        Self {
            op,
            ids,
            conversation: true,
            folder_id: None,
            tag_name: None,
            addresses: Vec::new(),
        }
    }
}

/// A mutating action response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Ids the server acted on.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Application fault, if the action was rejected.
    #[serde(default, rename = "Fault")]
    pub fault: Option<Fault>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fault::FaultCode;

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::new("in:inbox", ResultType::Message)
            .offset(100)
            .limit(50)
            .locale("en_US");
        assert_eq!(request.offset, 100);
        assert_eq!(request.limit, 50);
        assert_eq!(request.sort, SortOrder::DateDesc);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["types"], "message");
        assert_eq!(json["sortBy"], "dateDesc");
        assert_eq!(json["locale"], "en_US");
    }

    #[test]
    fn test_search_response_with_fault() {
        let json = r#"{"Fault":{"code":"mail.QUERY_PARSE_ERROR","reason":"unbalanced"}}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(response.fault.unwrap().is_query_parse_error());
        assert!(!response.more);
    }

    #[test]
    fn test_next_offset_counts_every_hit() {
        let json = r#"{"c":[{"id":"1"},{},{"id":"3"}],"m":[{"id":"9"}],"more":true,"offset":40}"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.next_offset(20, ResultType::Conversation), 43);
        assert_eq!(response.next_offset(20, ResultType::Message), 41);

        let response = SearchResponse {
            offset: None,
            ..response
        };
        assert_eq!(response.next_offset(20, ResultType::Conversation), 23);
    }

    #[test]
    fn test_expand_into_messages() {
        let response = ExpandResponse::with_messages(
            "123",
            vec![WireMessage::with_id("10"), WireMessage::with_id("2")],
        );
        let messages = response.into_messages().unwrap();
        assert_eq!(messages.len(), 2);

        let faulted = ExpandResponse::with_fault(Fault::new(FaultCode::NoSuchConversation, ""));
        assert_eq!(
            faulted.into_messages().unwrap_err().code,
            FaultCode::NoSuchConversation
        );
    }

    #[test]
    fn test_action_op_codes() {
        assert_eq!(serde_json::to_value(ActionOp::Unread).unwrap(), "!read");
        assert_eq!(serde_json::to_value(ActionOp::SendDraft).unwrap(), "sendDraft");

        let request = ActionRequest::conversations(ActionOp::Trash, vec!["123".into()]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["conversation"], true);
        assert!(json.get("l").is_none());
    }
}
