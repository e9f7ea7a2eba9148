use super::lock::{LockTable, StorageLock};
use super::{count_actions, TaskStore};
use crate::constants::keys::TASK_STATES_PREFIX;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::{
    QueryAction, QueryCheckpoint, QueryKey, QueryState, QueryStatus, QueryTask, QueryType,
    TaskKey, TaskState, TaskStates,
};
use crate::state_machine::QueryLifecycle;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Concurrent in-process task store.
///
/// Tasks and lifecycle records live in sharded maps; each write replaces a
/// single entry under its shard lock, so readers never observe a partially
/// updated task.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, QueryTask>,
    statuses: DashMap<Uuid, QueryStatus>,
    task_states: DashMap<Uuid, TaskStates>,
    locks: Arc<LockTable>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn query_count(&self) -> usize {
        self.statuses.len()
    }

    /// Task counts for every query in one pass over the task map
    fn counts_by_query(&self) -> HashMap<Uuid, Vec<QueryAction>> {
        let mut by_query: HashMap<Uuid, Vec<QueryAction>> = HashMap::new();
        for entry in self.tasks.iter() {
            by_query
                .entry(entry.query_key().query_id)
                .or_default()
                .push(entry.action());
        }
        by_query
    }

    fn states_matching(&self, filter: impl Fn(&QueryStatus) -> bool) -> Vec<QueryState> {
        let statuses: Vec<QueryStatus> = self
            .statuses
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        let mut by_query = self.counts_by_query();

        statuses
            .into_iter()
            .map(|status| QueryState {
                task_counts: count_actions(
                    by_query
                        .remove(&status.query_key.query_id)
                        .unwrap_or_default(),
                ),
                query_key: status.query_key,
                lifecycle: status.lifecycle,
            })
            .collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    #[instrument(skip(self, checkpoint), fields(query_key = %checkpoint.query_key()))]
    async fn create_task(
        &self,
        action: QueryAction,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        let task = QueryTask::new(action, checkpoint);
        self.tasks.insert(task.task_id(), task.clone());
        debug!(task_id = %task.task_id(), action = %action, "Stored new query task");
        Ok(task)
    }

    #[instrument(skip(self, checkpoint))]
    async fn update_task(
        &self,
        task_id: Uuid,
        checkpoint: QueryCheckpoint,
    ) -> SchedulerResult<QueryTask> {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or(SchedulerError::TaskNotFound { task_id })?;

        if entry.query_key() != checkpoint.query_key() {
            return Err(SchedulerError::InvalidInput(format!(
                "Checkpoint query key {} does not match task {} of {}",
                checkpoint.query_key(),
                task_id,
                entry.query_key()
            )));
        }

        let updated = entry.checkpointed(checkpoint);
        *entry = updated.clone();
        debug!(task_id = %task_id, action = %updated.action(), "Updated query task checkpoint");
        Ok(updated)
    }

    async fn get_task(&self, task_id: Uuid) -> SchedulerResult<Option<QueryTask>> {
        let task = self.tasks.get(&task_id).map(|entry| entry.value().clone());
        trace!(task_id = %task_id, found = task.is_some(), "Retrieved query task");
        Ok(task)
    }

    async fn delete_task(&self, task_id: Uuid) -> SchedulerResult<bool> {
        let removed = self.tasks.remove(&task_id).is_some();
        debug!(task_id = %task_id, removed, "Deleted query task");
        Ok(removed)
    }

    async fn get_tasks(&self, query_id: Uuid) -> SchedulerResult<Vec<QueryTask>> {
        let tasks: Vec<QueryTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.query_key().query_id == query_id)
            .map(|entry| entry.value().clone())
            .collect();
        trace!(query_id = %query_id, count = tasks.len(), "Retrieved tasks for query");
        Ok(tasks)
    }

    async fn list_query_states(&self) -> SchedulerResult<Vec<QueryState>> {
        let states = self.states_matching(|_| true);
        debug!(count = states.len(), "Retrieved query states");
        Ok(states)
    }

    async fn list_query_states_by_type(
        &self,
        query_type: &QueryType,
    ) -> SchedulerResult<Vec<QueryState>> {
        let states = self.states_matching(|status| &status.query_key.query_type == query_type);
        debug!(query_type = %query_type, count = states.len(), "Retrieved query states by type");
        Ok(states)
    }

    async fn get_query_state(&self, query_id: Uuid) -> SchedulerResult<Option<QueryState>> {
        let Some(status) = self.statuses.get(&query_id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let task_counts = self.task_counts(query_id).await?;
        Ok(Some(QueryState {
            query_key: status.query_key,
            lifecycle: status.lifecycle,
            task_counts,
        }))
    }

    async fn put_query_status(&self, status: QueryStatus) -> SchedulerResult<()> {
        debug!(
            query_key = %status.query_key,
            lifecycle = %status.lifecycle,
            "Stored query status"
        );
        self.statuses.insert(status.query_key.query_id, status);
        Ok(())
    }

    async fn get_query_status(&self, query_id: Uuid) -> SchedulerResult<Option<QueryStatus>> {
        Ok(self.statuses.get(&query_id).map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self))]
    async fn update_query_lifecycle(
        &self,
        query_id: Uuid,
        lifecycle: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus> {
        let mut entry = self
            .statuses
            .get_mut(&query_id)
            .ok_or(SchedulerError::QueryNotFound { query_id })?;

        if !entry.lifecycle.can_transition_to(lifecycle) {
            return Err(SchedulerError::InvalidStateTransition {
                query_id,
                from: entry.lifecycle.to_string(),
                to: lifecycle.to_string(),
            });
        }

        let updated = entry.transitioned(lifecycle);
        *entry = updated.clone();
        debug!(query_id = %query_id, lifecycle = %lifecycle, "Updated query lifecycle");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn transition_query(
        &self,
        query_id: Uuid,
        from: QueryLifecycle,
        to: QueryLifecycle,
    ) -> SchedulerResult<QueryStatus> {
        let mut entry = self
            .statuses
            .get_mut(&query_id)
            .ok_or(SchedulerError::QueryNotFound { query_id })?;

        if entry.lifecycle != from || !from.can_transition_to(to) {
            return Err(SchedulerError::InvalidStateTransition {
                query_id,
                from: entry.lifecycle.to_string(),
                to: to.to_string(),
            });
        }

        let updated = entry.transitioned(to);
        *entry = updated.clone();
        debug!(query_id = %query_id, from = %from, to = %to, "Transitioned query lifecycle");
        Ok(updated)
    }

    async fn update_task_states(&self, states: TaskStates) -> SchedulerResult<()> {
        debug!(
            query_key = %states.query_key,
            tasks = states.states.len(),
            max_running = states.max_running,
            "Stored task states"
        );
        self.task_states.insert(states.query_key.query_id, states);
        Ok(())
    }

    async fn get_task_states(&self, query_id: Uuid) -> SchedulerResult<Option<TaskStates>> {
        let states = self.task_states.get(&query_id).map(|entry| entry.value().clone());
        trace!(query_id = %query_id, found = states.is_some(), "Retrieved task states");
        Ok(states)
    }

    async fn delete_task_states(&self, query_id: Uuid) -> SchedulerResult<bool> {
        let removed = self.task_states.remove(&query_id).is_some();
        debug!(query_id = %query_id, removed, "Deleted task states");
        Ok(removed)
    }

    #[instrument(skip(self, task_key), fields(task_key = %task_key))]
    async fn update_task_state(
        &self,
        task_key: &TaskKey,
        state: TaskState,
    ) -> SchedulerResult<bool> {
        let query_id = task_key.query_id();
        let mut entry = self
            .task_states
            .get_mut(&query_id)
            .ok_or(SchedulerError::QueryNotFound { query_id })?;
        let updated = entry.set_state(task_key, state);
        debug!(state = %state, updated, "Updated task state");
        Ok(updated)
    }

    fn query_status_lock(&self, query_id: Uuid) -> Box<dyn StorageLock> {
        Box::new(self.locks.handle(QueryKey::id_prefix(query_id)))
    }

    fn task_states_lock(&self, query_id: Uuid) -> Box<dyn StorageLock> {
        Box::new(self.locks.handle(format!("{TASK_STATES_PREFIX}{query_id}")))
    }

    fn task_lock(&self, task_key: &TaskKey) -> Box<dyn StorageLock> {
        Box::new(self.locks.handle(task_key.to_key()))
    }

    /// Tasks are removed before the status record. A task written for the
    /// query while the delete runs survives it and stays reachable through
    /// `get_tasks` and `delete_task`.
    async fn delete_query(&self, query_id: Uuid) -> SchedulerResult<usize> {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| task.query_key().query_id != query_id);
        let deleted = before.saturating_sub(self.tasks.len());
        self.task_states.remove(&query_id);
        self.statuses.remove(&query_id);
        debug!(query_id = %query_id, deleted, "Deleted query and its tasks");
        Ok(deleted)
    }

    async fn clear(&self) -> SchedulerResult<()> {
        debug!("Clearing all queries and tasks");
        self.tasks.clear();
        self.task_states.clear();
        self.statuses.clear();
        self.locks.clear();
        Ok(())
    }

    async fn task_counts(&self, query_id: Uuid) -> SchedulerResult<BTreeMap<QueryAction, usize>> {
        Ok(count_actions(
            self.tasks
                .iter()
                .filter(|entry| entry.query_key().query_id == query_id)
                .map(|entry| entry.action()),
        ))
    }
}
