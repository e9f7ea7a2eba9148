#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # QueryTask Core
//!
//! Scheduling core for long-running, checkpointed queries.
//!
//! ## Overview
//!
//! A query is split into tasks. Each task carries a checkpoint: a durable
//! snapshot of the query's progress that an executor tier resumes from. This
//! crate owns the bookkeeping around those tasks; the executors themselves
//! live elsewhere.
//!
//! ## Architecture
//!
//! ```text
//!   submit_query ──► TaskPublisher ──► TaskStore ◄── executor tier
//!                          │                ▲
//!                          ▼                │ scan
//!                     TaskNotifier      WorkFinder ──► RemoteDispatcher
//!                                           ▲
//!                                      LeaseMonitor (single-flight, leased)
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Query keys, task keys, checkpoints, tasks and query states
//! - [`storage`] - The `TaskStore` contract, storage locks and the in-memory implementation
//! - [`state_machine`] - Query lifecycle states and legal transitions
//! - [`orchestration`] - Publisher, work finder, lease monitor, dedup cache
//! - [`services`] - Read-only introspection over the store
//! - [`events`] - Outbound task notifications
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use querytask_core::events::BroadcastNotifier;
//! use querytask_core::models::QueryType;
//! use querytask_core::orchestration::TaskPublisher;
//! use querytask_core::storage::InMemoryTaskStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryTaskStore::new());
//! let publisher = TaskPublisher::new(store, Arc::new(BroadcastNotifier::default()));
//!
//! let query_id = publisher
//!     .submit_query(QueryType::new("EventQuery"), serde_json::json!("GENRE == 'jazz'"))
//!     .await?;
//! println!("submitted {query_id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod storage;

pub use config::{ConfigManager, SchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{BroadcastNotifier, TaskNotifier};
pub use models::{
    QueryAction, QueryCheckpoint, QueryKey, QueryState, QueryTask, QueryTaskNotification,
    QueryType, TaskDescription, TaskKey, TaskState, TaskStates,
};
pub use orchestration::{
    DedupCache, FindWorkSummary, Job, LeaseMonitor, RemoteDispatcher, TaskPublisher, WorkFinder,
};
pub use services::QueryIntrospectionService;
pub use state_machine::QueryLifecycle;
pub use storage::{InMemoryTaskStore, StorageLock, TaskStore};
