//! Periodic reload of an externally owned cache, run under its own lease monitor.

use crate::error::SchedulerResult;
use crate::models::QueryType;
use crate::orchestration::lease_monitor::Job;
use crate::storage::TaskStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Anything that can refresh itself from its source of truth
#[async_trait]
pub trait Reloadable: Send + Sync + 'static {
    /// Refresh the cache, returning the number of entries now loaded
    async fn reload(&self) -> SchedulerResult<usize>;
}

pub struct CacheReloadJob<R: Reloadable> {
    name: String,
    cache: Arc<R>,
}

impl<R: Reloadable> CacheReloadJob<R> {
    pub fn new(name: impl Into<String>, cache: Arc<R>) -> Self {
        Self {
            name: name.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<R> {
        &self.cache
    }
}

impl<R: Reloadable> std::fmt::Debug for CacheReloadJob<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReloadJob")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: Reloadable> Job for CacheReloadJob<R> {
    type Output = usize;

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(job = %self.name))]
    async fn run(&self) -> SchedulerResult<usize> {
        let entries = self.cache.reload().await?;
        debug!(entries, "Cache reloaded");
        Ok(entries)
    }
}

/// Query types with at least one known query, refreshed from the task store
pub struct QueryTypeCache {
    store: Arc<dyn TaskStore>,
    types: RwLock<BTreeSet<QueryType>>,
}

impl QueryTypeCache {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            types: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn contains(&self, query_type: &QueryType) -> bool {
        self.types.read().contains(query_type)
    }

    pub fn query_types(&self) -> Vec<QueryType> {
        self.types.read().iter().cloned().collect()
    }
}

#[async_trait]
impl Reloadable for QueryTypeCache {
    async fn reload(&self) -> SchedulerResult<usize> {
        let fresh: BTreeSet<QueryType> = self
            .store
            .list_query_states()
            .await?
            .into_iter()
            .map(|state| state.query_key.query_type)
            .collect();
        let count = fresh.len();
        *self.types.write() = fresh;
        Ok(count)
    }
}
