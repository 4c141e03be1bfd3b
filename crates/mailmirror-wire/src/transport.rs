//! The transport seam.
//!
//! The engine never opens sockets. The host implements [`MailTransport`] on
//! top of whatever RPC stack it already has and hands it to the engine.

use std::future::Future;

use crate::error::Result;
use crate::request::{
    ActionRequest, ActionResponse, ExpandRequest, ExpandResponse, SearchRequest, SearchResponse,
};

/// Request/response calls the engine needs from the server.
///
/// Implementations report transport-level failures as [`crate::Error`].
/// Application faults should be returned inside the response body so the
/// engine can tell them apart; implementations that surface them as
/// [`crate::Error::Fault`] are handled the same way.
pub trait MailTransport: Send + Sync {
    /// Runs one search page.
    fn search(&self, request: SearchRequest)
    -> impl Future<Output = Result<SearchResponse>> + Send;

    /// Fetches every message of a conversation.
    fn expand(&self, request: ExpandRequest)
    -> impl Future<Output = Result<ExpandResponse>> + Send;

    /// Performs a mutating action.
    fn action(&self, request: ActionRequest)
    -> impl Future<Output = Result<ActionResponse>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::ResultType;
    use crate::types::WireMessage;

    /// Answers every call with an empty success.
    struct EchoTransport;

    impl MailTransport for EchoTransport {
        async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
            Ok(SearchResponse {
                offset: Some(request.offset),
                ..SearchResponse::default()
            })
        }

        async fn expand(&self, request: ExpandRequest) -> Result<ExpandResponse> {
            Ok(ExpandResponse::with_messages(
                request.conversation_id,
                vec![WireMessage::with_id("1")],
            ))
        }

        async fn action(&self, request: ActionRequest) -> Result<ActionResponse> {
            Ok(ActionResponse {
                ids: request.ids,
                fault: None,
            })
        }
    }

    #[tokio::test]
    async fn test_async_fn_impl() {
        let transport = EchoTransport;
        let response = transport
            .search(SearchRequest::new("in:inbox", ResultType::Conversation).offset(20))
            .await
            .unwrap();
        assert_eq!(response.offset, Some(20));

        let expanded = transport.expand(ExpandRequest::new("7")).await.unwrap();
        assert_eq!(expanded.into_messages().unwrap().len(), 1);
    }
}
