use crate::models::{QueryAction, QueryKey, QueryType};
use crate::state_machine::QueryLifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stored lifecycle record of a query, written by the publisher and the executor tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub query_key: QueryKey,
    pub lifecycle: QueryLifecycle,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl QueryStatus {
    pub fn new(query_key: QueryKey, lifecycle: QueryLifecycle) -> Self {
        let now = Utc::now();
        Self {
            query_key,
            lifecycle,
            created_at: now,
            last_updated: now,
        }
    }

    /// Copy of this record moved to `lifecycle`
    #[must_use]
    pub fn transitioned(&self, lifecycle: QueryLifecycle) -> Self {
        Self {
            query_key: self.query_key.clone(),
            lifecycle,
            created_at: self.created_at,
            last_updated: Utc::now(),
        }
    }
}

/// Aggregate view of one query, computed from the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub query_key: QueryKey,
    pub lifecycle: QueryLifecycle,
    pub task_counts: BTreeMap<QueryAction, usize>,
}

impl QueryState {
    pub fn query_id(&self) -> Uuid {
        self.query_key.query_id
    }

    pub fn query_type(&self) -> &QueryType {
        &self.query_key.query_type
    }

    pub fn task_count(&self, action: QueryAction) -> usize {
        self.task_counts.get(&action).copied().unwrap_or(0)
    }

    pub fn total_tasks(&self) -> usize {
        self.task_counts.values().sum()
    }
}
