use crate::error::SchedulerResult;
use crate::models::{QueryKey, QueryState, QueryType, TaskDescription};
use crate::state_machine::QueryLifecycle;
use crate::storage::TaskStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Read-only projections for operators and client-facing services
///
/// Nothing here schedules or mutates; every call is a thin view over
/// [`TaskStore`] reads.
#[derive(Clone)]
pub struct QueryIntrospectionService {
    store: Arc<dyn TaskStore>,
}

/// A non-terminal query and how much work it has accumulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningQuery {
    pub query_key: QueryKey,
    pub lifecycle: QueryLifecycle,
    pub total_tasks: usize,
}

impl From<&QueryState> for RunningQuery {
    fn from(state: &QueryState) -> Self {
        Self {
            query_key: state.query_key.clone(),
            lifecycle: state.lifecycle,
            total_tasks: state.total_tasks(),
        }
    }
}

impl std::fmt::Debug for QueryIntrospectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryIntrospectionService")
            .finish_non_exhaustive()
    }
}

impl QueryIntrospectionService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Queries not yet closed, canceled or failed, optionally of one type.
    ///
    /// Ordered by query type, then query id.
    #[instrument(skip(self))]
    pub async fn running_queries(
        &self,
        query_type: Option<&QueryType>,
    ) -> SchedulerResult<Vec<RunningQuery>> {
        let states = match query_type {
            Some(query_type) => self.store.list_query_states_by_type(query_type).await?,
            None => self.store.list_query_states().await?,
        };

        let mut running: Vec<RunningQuery> = states
            .iter()
            .filter(|state| !state.lifecycle.is_terminal())
            .map(RunningQuery::from)
            .collect();
        running.sort_by(|a, b| {
            a.query_key
                .query_type
                .as_str()
                .cmp(b.query_key.query_type.as_str())
                .then(a.query_key.query_id.cmp(&b.query_key.query_id))
        });

        debug!(count = running.len(), "Listed running queries");
        Ok(running)
    }

    /// Every task of a query, rendered for display
    #[instrument(skip(self))]
    pub async fn query_tasks(&self, query_id: Uuid) -> SchedulerResult<Vec<TaskDescription>> {
        self.store.list_tasks(query_id).await
    }

    pub async fn query_state(&self, query_id: Uuid) -> SchedulerResult<Option<QueryState>> {
        self.store.get_query_state(query_id).await
    }
}
