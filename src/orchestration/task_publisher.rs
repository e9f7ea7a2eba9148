//! # Task Publisher
//!
//! Entry point for new work. Persisting a task and announcing it are one
//! logical operation, but only the persistence is transactional: a failed
//! notification is logged and the persisted task is still returned. A
//! reconciliation sweep outside this crate catches tasks whose notification
//! never arrived.
//!
//! Checkpoint updates go straight to the store and are never re-announced;
//! they describe progress on existing work, not new work.

use crate::constants::locks::{CREATE_QUERY_LEASE, CREATE_QUERY_WAIT};
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::TaskNotifier;
use crate::logging::log_task_operation;
use crate::models::{QueryAction, QueryCheckpoint, QueryKey, QueryStatus, QueryTask, QueryType};
use crate::state_machine::QueryLifecycle;
use crate::storage::{StorageLock, TaskStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskPublisher {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn TaskNotifier>,
}

impl std::fmt::Debug for TaskPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPublisher").finish_non_exhaustive()
    }
}

impl TaskPublisher {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn TaskNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Record a query without creating any work for it yet
    #[instrument(skip(self))]
    pub async fn define_query(&self, query_type: QueryType) -> SchedulerResult<QueryKey> {
        let query_key = QueryKey::new(query_type, Uuid::new_v4());
        self.store
            .put_query_status(QueryStatus::new(query_key.clone(), QueryLifecycle::Defined))
            .await?;
        debug!(query_key = %query_key, "Defined query");
        Ok(query_key)
    }

    /// Create the initial CREATE task for a DEFINED query.
    ///
    /// Runs under the query status lock, and the move to CREATED is a
    /// compare-and-set from DEFINED, so concurrent callers produce exactly one
    /// CREATE task. The task is persisted before the query moves to CREATED,
    /// so a scan never sees a CREATED query without its initial task; it is
    /// announced only once the move has succeeded.
    #[instrument(skip(self, query_key, query_payload), fields(query_key = %query_key))]
    pub async fn create_query(
        &self,
        query_key: &QueryKey,
        query_payload: Value,
    ) -> SchedulerResult<QueryTask> {
        let lock = self.store.query_status_lock(query_key.query_id);
        if !lock
            .try_lock_for(CREATE_QUERY_WAIT, Some(CREATE_QUERY_LEASE))
            .await
        {
            return Err(SchedulerError::Timeout(format!(
                "query status lock {} not acquired within {}ms",
                lock.key(),
                CREATE_QUERY_WAIT.as_millis()
            )));
        }

        let result = self.create_query_locked(query_key, query_payload).await;
        if !lock.unlock() {
            warn!(lock = %lock.key(), "Query status lock lease expired before create_query finished");
        }
        result
    }

    async fn create_query_locked(
        &self,
        query_key: &QueryKey,
        query_payload: Value,
    ) -> SchedulerResult<QueryTask> {
        let query_id = query_key.query_id;
        let status = self
            .store
            .get_query_status(query_id)
            .await?
            .ok_or(SchedulerError::QueryNotFound { query_id })?;
        if status.lifecycle != QueryLifecycle::Defined {
            return Err(SchedulerError::InvalidStateTransition {
                query_id,
                from: status.lifecycle.to_string(),
                to: QueryLifecycle::Created.to_string(),
            });
        }

        let checkpoint = QueryCheckpoint::for_query(query_key.clone(), query_payload);
        let task = self.store.create_task(QueryAction::Create, checkpoint).await?;

        if let Err(e) = self
            .store
            .transition_query(query_id, QueryLifecycle::Defined, QueryLifecycle::Created)
            .await
        {
            if let Err(cleanup) = self.store.delete_task(task.task_id()).await {
                warn!(
                    task_key = %task.task_key(),
                    error = %cleanup,
                    "Failed to remove CREATE task of a query that was created concurrently"
                );
            }
            return Err(e);
        }

        self.announce(&task).await;
        log_task_operation(
            "create_query",
            Some(task.task_id()),
            Some(query_key),
            "created",
            None,
        );
        Ok(task)
    }

    /// Submit a query for execution and return its id without waiting for it to run
    #[instrument(skip(self, query_payload))]
    pub async fn submit_query(
        &self,
        query_type: QueryType,
        query_payload: Value,
    ) -> SchedulerResult<Uuid> {
        let query_key = self.define_query(query_type).await?;
        self.create_query(&query_key, query_payload).await?;
        Ok(query_key.query_id)
    }

    /// Persist a task and announce it
    #[instrument(skip(self, checkpoint), fields(query_key = %checkpoint.query_key()))]
    pub async fn create_task(
        &self,
        action: QueryAction,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        let task = self.store.create_task(action, checkpoint).await?;
        self.announce(&task).await;
        Ok(task)
    }

    async fn announce(&self, task: &QueryTask) {
        if let Err(e) = self.notifier.publish(task.notification()).await {
            warn!(
                task_key = %task.task_key(),
                action = %task.action(),
                error = %e,
                "Failed to publish task notification; task remains persisted"
            );
        }
    }

    /// Replace a task's checkpoint. No notification is published.
    #[instrument(skip(self, checkpoint))]
    pub async fn checkpoint_task(
        &self,
        task_id: Uuid,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        let task = self.store.update_task(task_id, checkpoint).await?;
        log_task_operation(
            "checkpoint_task",
            Some(task_id),
            Some(task.query_key()),
            "checkpointed",
            None,
        );
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcastNotifier, PublishError};
    use crate::models::QueryTaskNotification;
    use crate::storage::InMemoryTaskStore;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    struct ClosedNotifier;

    #[async_trait]
    impl TaskNotifier for ClosedNotifier {
        async fn publish(&self, _: QueryTaskNotification) -> Result<(), PublishError> {
            Err(PublishError::ChannelClosed)
        }
    }

    fn publisher_with_broadcast() -> (TaskPublisher, Arc<InMemoryTaskStore>, BroadcastNotifier) {
        let store = Arc::new(InMemoryTaskStore::new());
        let notifier = BroadcastNotifier::new(16);
        let publisher = TaskPublisher::new(store.clone(), Arc::new(notifier.clone()));
        (publisher, store, notifier)
    }

    #[tokio::test]
    async fn test_submit_query_creates_task_and_notifies() {
        let (publisher, store, notifier) = publisher_with_broadcast();
        let mut receiver = notifier.subscribe();

        let query_id = publisher
            .submit_query(QueryType::new("EventQuery"), json!("GENRE == 'jazz'"))
            .await
            .unwrap();

        let tasks = store.get_tasks(query_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.action(), QueryAction::Create);
        assert_eq!(task.checkpoint().query_payload(), Some(&json!("GENRE == 'jazz'")));

        let notification = receiver.recv().await.unwrap();
        assert_eq!(notification.task_key, task.task_key());
        assert_eq!(notification.action, QueryAction::Create);

        let state = store.get_query_state(query_id).await.unwrap().unwrap();
        assert_eq!(state.lifecycle, QueryLifecycle::Created);
        assert_eq!(state.task_count(QueryAction::Create), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_task_does_not_notify() {
        let (publisher, _store, notifier) = publisher_with_broadcast();
        let query_id = publisher
            .submit_query(QueryType::new("EventQuery"), json!("A == 'b'"))
            .await
            .unwrap();
        let mut receiver = notifier.subscribe();

        let task = publisher.store().get_tasks(query_id).await.unwrap().remove(0);
        let cp = task.checkpoint().with_property("cursor", json!(12));
        let updated = publisher.checkpoint_task(task.task_id(), cp).await.unwrap();

        assert_eq!(updated.task_id(), task.task_id());
        assert_eq!(receiver.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        let publisher = TaskPublisher::new(store.clone(), Arc::new(ClosedNotifier));
        let key = QueryKey::new("EventQuery", Uuid::new_v4());

        let task = publisher
            .create_task(QueryAction::Next, QueryCheckpoint::for_query(key, json!("x")))
            .await
            .unwrap();

        assert_eq!(store.get_task(task.task_id()).await.unwrap(), Some(task));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_query_times_out_on_held_status_lock() {
        let (publisher, store, notifier) = publisher_with_broadcast();
        let mut receiver = notifier.subscribe();
        let key = publisher.define_query(QueryType::new("EventQuery")).await.unwrap();

        let holder = store.query_status_lock(key.query_id);
        assert!(holder.try_lock(None));

        let err = publisher.create_query(&key, json!("A == 'b'")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Timeout(_)));
        assert!(store.get_tasks(key.query_id).await.unwrap().is_empty());
        assert_eq!(receiver.try_recv().unwrap_err(), TryRecvError::Empty);

        assert!(holder.unlock());
        publisher.create_query(&key, json!("A == 'b'")).await.unwrap();
        assert_eq!(receiver.try_recv().unwrap().action, QueryAction::Create);
    }

    #[tokio::test]
    async fn test_define_query_has_no_tasks() {
        let (publisher, store, _notifier) = publisher_with_broadcast();
        let key = publisher
            .define_query(QueryType::new("CountQuery"))
            .await
            .unwrap();

        let state = store.get_query_state(key.query_id).await.unwrap().unwrap();
        assert_eq!(state.lifecycle, QueryLifecycle::Defined);
        assert_eq!(state.total_tasks(), 0);

        publisher.create_query(&key, json!("A == 'b'")).await.unwrap();
        let state = store.get_query_state(key.query_id).await.unwrap().unwrap();
        assert_eq!(state.lifecycle, QueryLifecycle::Created);
        assert_eq!(state.task_count(QueryAction::Create), 1);

        let err = publisher.create_query(&key, json!("A == 'b'")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidStateTransition { .. }));
    }
}
