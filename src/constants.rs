//! # System Constants
//!
//! Well-known checkpoint property keys, storage key prefixes and the default
//! operating limits of the scheduler.

/// Checkpoint property keys shared between the publisher and the executor tier
pub mod properties {
    /// Raw query payload embedded in the initial checkpoint
    pub const QUERY: &str = "query";
    /// Opaque cursor recorded by the executor tier between pages
    pub const CURSOR: &str = "cursor";
}

/// Prefixes used when rendering keys into the store keyspace
pub mod keys {
    pub const QUERY_PREFIX: &str = "Q:";
    pub const TASK_PREFIX: &str = "T:";
    pub const TASK_STATES_PREFIX: &str = "S:";
}

/// Defaults applied when configuration omits a value
pub mod defaults {
    pub const WORK_FINDER_TRIGGER_INTERVAL_MS: u64 = 30_000;
    pub const WORK_FINDER_LEASE_MS: u64 = 60_000;
    pub const CLOSE_CANCEL_CACHE_SIZE: usize = 1_000;
    pub const CACHE_RELOAD_TRIGGER_INTERVAL_MS: u64 = 300_000;
    pub const CACHE_RELOAD_LEASE_MS: u64 = 120_000;
    pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 1_000;
    pub const ORIGIN_SERVICE: &str = "query-scheduler";
    pub const DESTINATION_SERVICE: &str = "query-executor";
    pub const MAX_CONCURRENT_TASKS: usize = 10;
}

/// Storage lock timing
pub mod locks {
    use std::time::Duration;

    /// How often a waiting locker re-checks a held lock
    pub const RETRY_INTERVAL: Duration = Duration::from_millis(5);
    /// Lease on the query status lock taken while creating a query
    pub const CREATE_QUERY_LEASE: Duration = Duration::from_secs(30);
    /// How long `create_query` waits for the query status lock
    pub const CREATE_QUERY_WAIT: Duration = Duration::from_secs(10);
}
