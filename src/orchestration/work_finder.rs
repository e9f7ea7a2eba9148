//! # Work Finder
//!
//! One scan-and-dispatch pass over every known query:
//!
//! | Lifecycle            | Request                                   |
//! |----------------------|-------------------------------------------|
//! | `Closed`             | CLOSE, once per dedup window              |
//! | `Canceled`           | CANCEL, once per dedup window             |
//! | `Created`, `Running` | NEXT, every pass                          |
//! | `Defined`, `Failed`  | none                                      |
//!
//! A failed dispatch is logged and counted; the pass continues with the next
//! query. Failed CLOSE/CANCEL requests are not remembered, so the next pass
//! retries them.

use crate::config::WorkFinderConfig;
use crate::error::SchedulerResult;
use crate::logging::log_dispatch_operation;
use crate::models::{QueryAction, QueryState};
use crate::orchestration::dedup_cache::DedupCache;
use crate::orchestration::dispatcher::{QueryRequest, RemoteDispatcher};
use crate::orchestration::lease_monitor::Job;
use crate::state_machine::QueryLifecycle;
use crate::storage::TaskStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Counts from a single work finder pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindWorkSummary {
    pub queries_scanned: usize,
    pub next_dispatched: usize,
    pub close_dispatched: usize,
    pub cancel_dispatched: usize,
    /// CLOSE/CANCEL requests skipped because the query was dispatched recently
    pub suppressed: usize,
    pub failed: usize,
}

impl FindWorkSummary {
    pub fn total_dispatched(&self) -> usize {
        self.next_dispatched + self.close_dispatched + self.cancel_dispatched
    }

    fn record(&mut self, action: QueryAction) {
        match action {
            QueryAction::Next => self.next_dispatched += 1,
            QueryAction::Close => self.close_dispatched += 1,
            QueryAction::Cancel => self.cancel_dispatched += 1,
            _ => {}
        }
    }
}

pub struct WorkFinder {
    store: Arc<dyn TaskStore>,
    dispatcher: Arc<dyn RemoteDispatcher>,
    // Locked only between awaits; passes are single-flight under the lease monitor
    terminal_dispatched: Mutex<DedupCache<Uuid>>,
    origin_service: String,
    destination_service: String,
}

impl std::fmt::Debug for WorkFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkFinder")
            .field("origin_service", &self.origin_service)
            .field("destination_service", &self.destination_service)
            .field("dedup_len", &self.terminal_dispatched.lock().len())
            .finish_non_exhaustive()
    }
}

impl WorkFinder {
    pub fn new(
        store: Arc<dyn TaskStore>,
        dispatcher: Arc<dyn RemoteDispatcher>,
        dedup_capacity: usize,
        origin_service: impl Into<String>,
        destination_service: impl Into<String>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            terminal_dispatched: Mutex::new(DedupCache::new(dedup_capacity)),
            origin_service: origin_service.into(),
            destination_service: destination_service.into(),
        }
    }

    pub fn from_config(
        store: Arc<dyn TaskStore>,
        dispatcher: Arc<dyn RemoteDispatcher>,
        config: &WorkFinderConfig,
    ) -> Self {
        Self::new(
            store,
            dispatcher,
            config.close_cancel_cache_size,
            config.origin_service.clone(),
            config.destination_service.clone(),
        )
    }

    /// Scan every query once and dispatch the requests its lifecycle calls for
    #[instrument(skip(self))]
    pub async fn find_work(&self) -> SchedulerResult<FindWorkSummary> {
        let states = self.store.list_query_states().await?;
        let mut summary = FindWorkSummary {
            queries_scanned: states.len(),
            ..Default::default()
        };

        for state in &states {
            self.process(state, &mut summary).await;
        }

        if summary.total_dispatched() > 0 || summary.failed > 0 {
            info!(
                scanned = summary.queries_scanned,
                next = summary.next_dispatched,
                close = summary.close_dispatched,
                cancel = summary.cancel_dispatched,
                suppressed = summary.suppressed,
                failed = summary.failed,
                "Work finder pass complete"
            );
        } else {
            debug!(scanned = summary.queries_scanned, "Work finder pass found nothing to do");
        }

        Ok(summary)
    }

    async fn process(&self, state: &QueryState, summary: &mut FindWorkSummary) {
        let query_id = state.query_id();
        let request = match state.lifecycle {
            QueryLifecycle::Closed => QueryRequest::close(query_id),
            QueryLifecycle::Canceled => QueryRequest::cancel(query_id),
            lifecycle if lifecycle.should_advance() => QueryRequest::next(query_id),
            _ => return,
        };

        let deduplicated = request.action.is_terminal();
        let recently_sent = deduplicated && self.terminal_dispatched.lock().contains(&query_id);
        if recently_sent {
            summary.suppressed += 1;
            return;
        }

        match self
            .dispatcher
            .dispatch(request, &self.origin_service, &self.destination_service)
            .await
        {
            Ok(()) => {
                if deduplicated {
                    self.terminal_dispatched.lock().add(query_id);
                }
                summary.record(request.action);
                log_dispatch_operation(
                    &request.action.to_string(),
                    query_id,
                    &self.origin_service,
                    &self.destination_service,
                    "dispatched",
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(
                    request = %request,
                    query_key = %state.query_key,
                    error = %e,
                    "Dispatch failed; continuing with remaining queries"
                );
            }
        }
    }

    /// Forget a query so its next CLOSE/CANCEL is dispatched again
    pub fn forget(&self, query_id: Uuid) -> bool {
        self.terminal_dispatched.lock().remove(&query_id)
    }

    pub fn recently_terminated(&self, query_id: Uuid) -> bool {
        self.terminal_dispatched.lock().contains(&query_id)
    }
}

#[async_trait]
impl Job for WorkFinder {
    type Output = FindWorkSummary;

    fn name(&self) -> &str {
        "work_finder"
    }

    async fn run(&self) -> SchedulerResult<FindWorkSummary> {
        self.find_work().await
    }
}
