//! # Orchestration
//!
//! Scheduling components that sit between the task store and the executor tier.
//!
//! ## Core Components
//!
//! - **TaskPublisher**: accepts query submissions, persists tasks and announces them
//! - **WorkFinder**: scans query states and dispatches NEXT/CLOSE/CANCEL requests
//! - **LeaseMonitor**: single-flight, lease-guarded runner for recurring jobs
//! - **DedupCache**: bounded FIFO set suppressing repeat terminal dispatches
//! - **CacheReloadJob**: adapts a reloadable cache into a monitored job
//! - **ChannelDispatcher**: in-process remote dispatch over an mpsc channel

pub mod cache_reload;
pub mod dedup_cache;
pub mod dispatcher;
pub mod lease_monitor;
pub mod task_publisher;
pub mod work_finder;

pub use cache_reload::{CacheReloadJob, QueryTypeCache, Reloadable};
pub use dedup_cache::DedupCache;
pub use dispatcher::{ChannelDispatcher, DispatchEnvelope, QueryRequest, RemoteDispatcher};
pub use lease_monitor::{Job, LeaseMonitor, LeaseMonitorStats, TickOutcome};
pub use task_publisher::TaskPublisher;
pub use work_finder::{FindWorkSummary, WorkFinder};
