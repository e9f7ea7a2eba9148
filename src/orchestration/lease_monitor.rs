//! # Lease Monitor
//!
//! Generic single-flight runner for recurring background jobs. Every tick
//! either harvests a finished job, cancels one that has outlived its lease, or
//! submits a fresh one; it never blocks on the job itself.
//!
//! At most one job is in flight per monitor. A lease-expired job keeps its
//! handle until the runtime reports it finished, and only then is a
//! replacement submitted.
//!
//! Jobs run on a dedicated single-worker executor owned by the monitor, while
//! the trigger runs on the ambient runtime. A job that blocks its worker
//! thread cannot starve the trigger or other monitors.
//!
//! ```text
//! tick ──► finished? ── yes ──► harvest, clear ──┐
//!             │ no                               │
//!             ▼                                  ▼
//!        lease expired? ── yes ──► abort      no handle? ──► submit
//! ```

use crate::error::{SchedulerError, SchedulerResult};
use crate::logging::{log_error, log_monitor_operation};
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Thread name prefix of the per-monitor job executor
pub const EXECUTOR_THREAD_PREFIX: &str = "querytask-job-";

/// A unit of recurring background work
#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Output: fmt::Debug + Send + 'static;

    fn name(&self) -> &str;

    async fn run(&self) -> SchedulerResult<Self::Output>;
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new job was submitted, after harvesting the previous one if there was one
    Submitted,
    /// The in-flight job is still within its lease
    Running,
    /// The lease expired on this tick and cancellation was requested
    LeaseExpired,
    /// Cancellation was requested earlier and the job has not finished yet
    AwaitingCancellation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseMonitorStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub lease_expirations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    lease_expirations: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> LeaseMonitorStats {
        LeaseMonitorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            lease_expirations: self.lease_expirations.load(Ordering::Relaxed),
        }
    }
}

struct InFlight<T> {
    handle: JoinHandle<SchedulerResult<T>>,
    started_at: Instant,
    cancel_requested: bool,
}

struct MonitorInner<J: Job> {
    job: Arc<J>,
    lease: Duration,
    executor: Handle,
    in_flight: Mutex<Option<InFlight<J::Output>>>,
    counters: Counters,
}

impl<J: Job> MonitorInner<J> {
    fn tick(&self) -> TickOutcome {
        let mut slot = self.in_flight.lock();

        if let Some(current) = slot.as_mut() {
            if current.handle.is_finished() {
                match (&mut current.handle).now_or_never() {
                    Some(result) => {
                        self.harvest(result);
                        *slot = None;
                    }
                    // Finished but not yet observable; try again next tick
                    None => return TickOutcome::Running,
                }
            } else if current.started_at.elapsed() > self.lease {
                if current.cancel_requested {
                    return TickOutcome::AwaitingCancellation;
                }
                current.handle.abort();
                current.cancel_requested = true;
                self.counters
                    .lease_expirations
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    job = %self.job.name(),
                    lease_ms = self.lease.as_millis() as u64,
                    elapsed_ms = current.started_at.elapsed().as_millis() as u64,
                    "Job exceeded its lease; cancellation requested"
                );
                return TickOutcome::LeaseExpired;
            } else {
                return TickOutcome::Running;
            }
        }

        let job = Arc::clone(&self.job);
        let handle = self.executor.spawn(async move { job.run().await });
        *slot = Some(InFlight {
            handle,
            started_at: Instant::now(),
            cancel_requested: false,
        });
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(job = %self.job.name(), "Submitted job");
        TickOutcome::Submitted
    }

    fn harvest(&self, result: Result<SchedulerResult<J::Output>, tokio::task::JoinError>) {
        let name = self.job.name();
        match result {
            Ok(Ok(output)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!(job = %name, output = ?output, "Job completed");
            }
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log_error(name, "run", &e.to_string(), Some("job failed; next cycle proceeds"));
            }
            Err(join_error) if join_error.is_cancelled() => {
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                log_monitor_operation(name, "harvest", "cancelled", None);
            }
            Err(join_error) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log_error(name, "run", &join_error.to_string(), Some("job panicked"));
            }
        }
    }

    fn abort_in_flight(&self) {
        if let Some(current) = self.in_flight.lock().take() {
            current.handle.abort();
        }
    }
}

/// Single-flight, lease-guarded runner for one [`Job`]
pub struct LeaseMonitor<J: Job> {
    inner: Arc<MonitorInner<J>>,
    trigger_runtime: Handle,
    trigger: Mutex<Option<JoinHandle<()>>>,
    // Present when the monitor owns its job executor
    executor_runtime: Option<Runtime>,
}

impl<J: Job> fmt::Debug for LeaseMonitor<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseMonitor")
            .field("job", &self.inner.job.name())
            .field("lease", &self.inner.lease)
            .field("dedicated_executor", &self.executor_runtime.is_some())
            .field("has_in_flight_job", &self.has_in_flight_job())
            .field("is_running", &self.is_running())
            .finish()
    }
}

impl<J: Job> LeaseMonitor<J> {
    /// Create a monitor whose jobs run on a new single-worker executor.
    ///
    /// The trigger started by [`start`](Self::start) runs on the current
    /// tokio runtime.
    pub fn new(job: J, lease: Duration) -> SchedulerResult<Self> {
        let trigger_runtime = Handle::try_current()
            .map_err(|e| SchedulerError::job(job.name(), format!("no tokio runtime: {e}")))?;
        let executor = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{EXECUTOR_THREAD_PREFIX}{}", job.name()))
            .enable_all()
            .build()
            .map_err(|e| {
                SchedulerError::job(job.name(), format!("failed to build job executor: {e}"))
            })?;
        let executor_handle = executor.handle().clone();
        Ok(Self::build(job, lease, trigger_runtime, executor_handle, Some(executor)))
    }

    /// Create a monitor that runs both its trigger and its jobs on `runtime`
    pub fn with_runtime(job: J, lease: Duration, runtime: Handle) -> Self {
        Self::build(job, lease, runtime.clone(), runtime, None)
    }

    fn build(
        job: J,
        lease: Duration,
        trigger_runtime: Handle,
        executor: Handle,
        executor_runtime: Option<Runtime>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                job: Arc::new(job),
                lease,
                executor,
                in_flight: Mutex::new(None),
                counters: Counters::default(),
            }),
            trigger_runtime,
            trigger: Mutex::new(None),
            executor_runtime,
        }
    }

    /// Run one harvest / expire / submit cycle
    pub fn tick(&self) -> TickOutcome {
        self.inner.tick()
    }

    /// Start invoking [`tick`](Self::tick) every `trigger_interval`
    pub fn start(&self, trigger_interval: Duration) {
        let mut trigger = self.trigger.lock();
        if trigger.is_some() {
            warn!(job = %self.inner.job.name(), "Lease monitor already running");
            return;
        }

        info!(
            job = %self.inner.job.name(),
            interval_ms = trigger_interval.as_millis() as u64,
            lease_ms = self.inner.lease.as_millis() as u64,
            "Starting lease monitor"
        );

        let inner = Arc::clone(&self.inner);
        *trigger = Some(self.trigger_runtime.spawn(async move {
            let mut ticker = interval(trigger_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.tick();
            }
        }));
        log_monitor_operation(self.inner.job.name(), "start", "running", None);
    }

    /// Stop the trigger and cancel any in-flight job
    pub fn stop(&self) {
        if let Some(handle) = self.trigger.lock().take() {
            info!(job = %self.inner.job.name(), "Stopping lease monitor");
            handle.abort();
        }
        self.inner.abort_in_flight();
        log_monitor_operation(self.inner.job.name(), "stop", "stopped", None);
    }

    pub fn is_running(&self) -> bool {
        self.trigger.lock().is_some()
    }

    pub fn has_in_flight_job(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    pub fn stats(&self) -> LeaseMonitorStats {
        self.inner.counters.snapshot()
    }

    pub fn lease(&self) -> Duration {
        self.inner.lease
    }

    pub fn job(&self) -> &J {
        &self.inner.job
    }
}

impl<J: Job> Drop for LeaseMonitor<J> {
    fn drop(&mut self) {
        if let Some(handle) = self.trigger.get_mut().take() {
            handle.abort();
        }
        self.inner.abort_in_flight();
        // Dropping a runtime blocks, which is not allowed inside async code
        if let Some(executor) = self.executor_runtime.take() {
            executor.shutdown_background();
        }
    }
}
