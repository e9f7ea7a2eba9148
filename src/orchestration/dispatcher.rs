//! # Remote Dispatch
//!
//! The executor-facing interface the work finder calls to drive queries
//! forward. A dispatch may be a network call; from the caller's side it
//! completes (or fails) before the next query is examined.

use crate::error::{SchedulerError, SchedulerResult};
use crate::models::QueryAction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::instrument;
use uuid::Uuid;

/// One remote request: which action to apply to which query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryRequest {
    pub action: QueryAction,
    pub query_id: Uuid,
}

impl QueryRequest {
    pub fn new(action: QueryAction, query_id: Uuid) -> Self {
        Self { action, query_id }
    }

    pub fn next(query_id: Uuid) -> Self {
        Self::new(QueryAction::Next, query_id)
    }

    pub fn close(query_id: Uuid) -> Self {
        Self::new(QueryAction::Close, query_id)
    }

    pub fn cancel(query_id: Uuid) -> Self {
        Self::new(QueryAction::Cancel, query_id)
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.action, self.query_id)
    }
}

#[async_trait]
pub trait RemoteDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        request: QueryRequest,
        origin_service: &str,
        destination_service: &str,
    ) -> SchedulerResult<()>;
}

/// A request as delivered to an in-process executor tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub request: QueryRequest,
    pub origin_service: String,
    pub destination_service: String,
}

/// Dispatcher that hands requests to an in-process executor over an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::Sender<DispatchEnvelope>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end the executor tier drains
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<DispatchEnvelope>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl RemoteDispatcher for ChannelDispatcher {
    #[instrument(skip(self, request), fields(request = %request))]
    async fn dispatch(
        &self,
        request: QueryRequest,
        origin_service: &str,
        destination_service: &str,
    ) -> SchedulerResult<()> {
        let envelope = DispatchEnvelope {
            request,
            origin_service: origin_service.to_string(),
            destination_service: destination_service.to_string(),
        };
        self.sender.send(envelope).await.map_err(|_| {
            SchedulerError::dispatch(
                request.action,
                request.query_id,
                format!("executor channel to {destination_service} is closed"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_dispatcher_delivers_envelope() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new(4);
        let query_id = Uuid::new_v4();

        dispatcher
            .dispatch(QueryRequest::close(query_id), "scheduler", "executor")
            .await
            .unwrap();

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.request, QueryRequest::close(query_id));
        assert_eq!(envelope.origin_service, "scheduler");
        assert_eq!(envelope.destination_service, "executor");
    }

    #[tokio::test]
    async fn test_closed_channel_is_dispatch_error() {
        let (dispatcher, receiver) = ChannelDispatcher::new(1);
        drop(receiver);

        let err = dispatcher
            .dispatch(QueryRequest::next(Uuid::new_v4()), "scheduler", "executor")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DispatchError { .. }));
    }

    #[test]
    fn test_request_wire_format() {
        let query_id = Uuid::new_v4();
        let json = serde_json::to_value(QueryRequest::cancel(query_id)).unwrap();
        assert_eq!(json["action"], "CANCEL");
        assert_eq!(json["query_id"], query_id.to_string());
    }
}
