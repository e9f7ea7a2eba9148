//! Shared fixtures for integration tests
#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use querytask_core::events::{PublishError, TaskNotifier};
use querytask_core::models::{
    QueryAction, QueryCheckpoint, QueryKey, QueryState, QueryStatus, QueryTask,
    QueryTaskNotification, QueryType, TaskKey, TaskState, TaskStates,
};
use querytask_core::orchestration::{QueryRequest, RemoteDispatcher};
use querytask_core::state_machine::QueryLifecycle;
use querytask_core::storage::{InMemoryTaskStore, StorageLock, TaskStore};
use querytask_core::{SchedulerError, SchedulerResult};
use std::collections::HashSet;
use tokio::task::yield_now;
use uuid::Uuid;

/// Dispatcher that records every request and optionally rejects some queries
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<QueryRequest>>,
    failing: Mutex<HashSet<Uuid>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, query_id: Uuid) {
        self.failing.lock().insert(query_id);
    }

    pub fn recover(&self, query_id: Uuid) {
        self.failing.lock().remove(&query_id);
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, request: QueryRequest) -> usize {
        self.requests.lock().iter().filter(|r| **r == request).count()
    }
}

#[async_trait]
impl RemoteDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        request: QueryRequest,
        _origin_service: &str,
        destination_service: &str,
    ) -> SchedulerResult<()> {
        if self.failing.lock().contains(&request.query_id) {
            return Err(SchedulerError::dispatch(
                request.action,
                request.query_id,
                format!("{destination_service} unavailable"),
            ));
        }
        self.requests.lock().push(request);
        Ok(())
    }
}

/// Notifier that records notifications
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<QueryTaskNotification>>,
}

#[async_trait]
impl TaskNotifier for RecordingNotifier {
    async fn publish(&self, notification: QueryTaskNotification) -> Result<(), PublishError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Notifier whose channel is always closed
pub struct FailingNotifier;

#[async_trait]
impl TaskNotifier for FailingNotifier {
    async fn publish(&self, _notification: QueryTaskNotification) -> Result<(), PublishError> {
        Err(PublishError::ChannelClosed)
    }
}

/// Store a lifecycle record for a fresh query and return its key
pub async fn seed_query(
    store: &dyn TaskStore,
    query_type: &str,
    lifecycle: QueryLifecycle,
) -> QueryKey {
    let key = QueryKey::new(query_type, Uuid::new_v4());
    store
        .put_query_status(QueryStatus::new(key.clone(), lifecycle))
        .await
        .unwrap();
    key
}

/// In-memory store that yields to the scheduler before every async call,
/// interleaving concurrent callers the way a networked store would
#[derive(Default)]
pub struct YieldingStore {
    pub inner: InMemoryTaskStore,
}

#[async_trait]
impl TaskStore for YieldingStore {
    async fn create_task(
        &self,
        action: QueryAction,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        yield_now().await;
        self.inner.create_task(action, checkpoint).await
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        yield_now().await;
        self.inner.update_task(task_id, checkpoint).await
    }

    async fn get_task(&self, task_id: Uuid) -> SchedulerResult<Option<QueryTask>> {
        yield_now().await;
        self.inner.get_task(task_id).await
    }

    async fn delete_task(&self, task_id: Uuid) -> SchedulerResult<bool> {
        yield_now().await;
        self.inner.delete_task(task_id).await
    }

    async fn get_tasks(&self, query_id: Uuid) -> SchedulerResult<Vec<QueryTask>> {
        yield_now().await;
        self.inner.get_tasks(query_id).await
    }

    async fn list_query_states(&self) -> SchedulerResult<Vec<QueryState>> {
        yield_now().await;
        self.inner.list_query_states().await
    }

    async fn list_query_states_by_type(
        &self,
        query_type: &QueryType,
    ) -> SchedulerResult<Vec<QueryState>> {
        yield_now().await;
        self.inner.list_query_states_by_type(query_type).await
    }

    async fn get_query_state(&self, query_id: Uuid) -> SchedulerResult<Option<QueryState>> {
        yield_now().await;
        self.inner.get_query_state(query_id).await
    }

    async fn put_query_status(&self, status: QueryStatus) -> SchedulerResult<()> {
        yield_now().await;
        self.inner.put_query_status(status).await
    }

    async fn get_query_status(&self, query_id: Uuid) -> SchedulerResult<Option<QueryStatus>> {
        yield_now().await;
        self.inner.get_query_status(query_id).await
    }

    async fn update_query_lifecycle(
        &self,
        query_id: Uuid,
        lifecycle: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus> {
        yield_now().await;
        self.inner.update_query_lifecycle(query_id, lifecycle).await
    }

    async fn transition_query(
        &self,
        query_id: Uuid,
        from: QueryLifecycle,
        to: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus> {
        yield_now().await;
        self.inner.transition_query(query_id, from, to).await
    }

    async fn update_task_states(&self, states: TaskStates) -> SchedulerResult<()> {
        yield_now().await;
        self.inner.update_task_states(states).await
    }

    async fn get_task_states(&self, query_id: Uuid) -> SchedulerResult<Option<TaskStates>> {
        yield_now().await;
        self.inner.get_task_states(query_id).await
    }

    async fn delete_task_states(&self, query_id: Uuid) -> SchedulerResult<bool> {
        yield_now().await;
        self.inner.delete_task_states(query_id).await
    }

    async fn update_task_state(
        &self,
        task_key: &TaskKey,
        state: TaskState,
    ) -> SchedulerResult<bool> {
        yield_now().await;
        self.inner.update_task_state(task_key, state).await
    }

    fn query_status_lock(&self, query_id: Uuid) -> Box<dyn StorageLock> {
        self.inner.query_status_lock(query_id)
    }

    fn task_states_lock(&self, query_id: Uuid) -> Box<dyn StorageLock> {
        self.inner.task_states_lock(query_id)
    }

    fn task_lock(&self, task_key: &TaskKey) -> Box<dyn StorageLock> {
        self.inner.task_lock(task_key)
    }

    async fn delete_query(&self, query_id: Uuid) -> SchedulerResult<usize> {
        yield_now().await;
        self.inner.delete_query(query_id).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        yield_now().await;
        self.inner.clear().await
    }
}
