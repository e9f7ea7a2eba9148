//! # Task Storage
//!
//! The `TaskStore` trait is the persistence contract of the scheduler: tasks
//! are addressed by their stable task id, query lifecycle records by query id,
//! and every write is atomic per task. `QueryState` is never written; it is
//! computed from the stored lifecycle record plus the live task counts.
//!
//! Every stored record also has a named lease lock (see [`StorageLock`]) for
//! callers that need to serialise a read-modify-write sequence across
//! several store calls.
//!
//! The underlying storage engine is an external collaborator. This crate ships
//! [`InMemoryTaskStore`], a concurrent in-process implementation used by the
//! scheduler binary and the test suite.

pub mod lock;
pub mod memory;

pub use lock::{LeaseLock, LockTable, StorageLock};
pub use memory::InMemoryTaskStore;

use crate::error::SchedulerResult;
use crate::models::{
    QueryAction, QueryCheckpoint, QueryState, QueryStatus, QueryTask, QueryType, TaskDescription,
    TaskKey, TaskState, TaskStates,
};
use crate::state_machine::QueryLifecycle;
use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Allocate a task id, persist the task and return it
    async fn create_task(
        &self,
        action: QueryAction,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask>;

    /// Replace the checkpoint of an existing task, keeping its id and action.
    ///
    /// Fails with `TaskNotFound` when the task does not exist; an update never
    /// creates a task.
    async fn update_task(
        &self,
        task_id: Uuid,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask>;

    async fn get_task(&self, task_id: Uuid) -> SchedulerResult<Option<QueryTask>>;

    /// Remove a task, returning whether it existed
    async fn delete_task(&self, task_id: Uuid) -> SchedulerResult<bool>;

    /// All tasks belonging to a query
    async fn get_tasks(&self, query_id: Uuid) -> SchedulerResult<Vec<QueryTask>>;

    async fn list_query_states(&self) -> SchedulerResult<Vec<QueryState>>;

    async fn list_query_states_by_type(
        &self,
        query_type: &QueryType,
    ) -> SchedulerResult<Vec<QueryState>>;

    async fn get_query_state(&self, query_id: Uuid) -> SchedulerResult<Option<QueryState>>;

    /// Store a lifecycle record as-is, replacing any previous record
    async fn put_query_status(&self, status: QueryStatus) -> SchedulerResult<()>;

    async fn get_query_status(&self, query_id: Uuid) -> SchedulerResult<Option<QueryStatus>>;

    /// Move a query to `lifecycle`, validated against the lifecycle state machine
    async fn update_query_lifecycle(
        &self,
        query_id: Uuid,
        lifecycle: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus>;

    /// Move a query from exactly `from` to `to`.
    ///
    /// Fails with `InvalidStateTransition` when the current lifecycle is not
    /// `from` or the move is illegal, so of two racing callers only one wins.
    async fn transition_query(
        &self,
        query_id: Uuid,
        from: QueryLifecycle,
        to: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus>;

    /// Store the task states of a query, replacing any previous record
    async fn update_task_states(&self, states: TaskStates) -> SchedulerResult<()>;

    async fn get_task_states(&self, query_id: Uuid) -> SchedulerResult<Option<TaskStates>>;

    /// Remove the task states of a query, returning whether they existed
    async fn delete_task_states(&self, query_id: Uuid) -> SchedulerResult<bool>;

    /// Record one task's state.
    ///
    /// Returns `false` when the query's running limit refuses a move to
    /// `Running`. Fails with `QueryNotFound` when the query has no task states.
    async fn update_task_state(&self, task_key: &TaskKey, state: TaskState)
        -> SchedulerResult<bool>;

    fn query_status_lock(&self, query_id: Uuid) -> Box<dyn StorageLock>;

    fn task_states_lock(&self, query_id: Uuid) -> Box<dyn StorageLock>;

    fn task_lock(&self, task_key: &TaskKey) -> Box<dyn StorageLock>;

    /// Delete the lifecycle record, task states and every task of a query, returning the number of tasks removed
    async fn delete_query(&self, query_id: Uuid) -> SchedulerResult<usize>;

    async fn clear(&self) -> SchedulerResult<()>;

    async fn list_tasks(&self, query_id: Uuid) -> SchedulerResult<Vec<TaskDescription>> {
        let tasks = self.get_tasks(query_id).await?;
        Ok(tasks.iter().map(TaskDescription::from).collect())
    }

    /// Number of tasks per action; every action is present, zero-filled
    async fn task_counts(&self, query_id: Uuid) -> SchedulerResult<BTreeMap<QueryAction, usize>> {
        let tasks = self.get_tasks(query_id).await?;
        Ok(count_actions(tasks.iter().map(QueryTask::action)))
    }
}

pub(crate) fn count_actions(
    actions: impl IntoIterator<Item = QueryAction>,
) -> BTreeMap<QueryAction, usize> {
    let mut counts: BTreeMap<QueryAction, usize> =
        QueryAction::ALL.iter().map(|action| (*action, 0)).collect();
    for action in actions {
        *counts.entry(action).or_insert(0) += 1;
    }
    counts
}
