//! Query Scheduler Binary
//!
//! Runs the work finder and cache reload lease monitors against an in-memory
//! task store until Ctrl-C. Each monitor runs its job on its own single-worker
//! executor. Remote dispatches are delivered to an in-process channel and
//! logged.
//!
//! Configuration is read from the file named by the first argument, then
//! `QUERYTASK_CONFIG_PATH`, then `config/scheduler.toml`.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use querytask_core::config::ConfigManager;
use querytask_core::logging::init_structured_logging;
use querytask_core::orchestration::{
    CacheReloadJob, ChannelDispatcher, LeaseMonitor, QueryTypeCache, WorkFinder,
};
use querytask_core::storage::{InMemoryTaskStore, TaskStore};

const DEFAULT_CONFIG_PATH: &str = "config/scheduler.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("QUERYTASK_CONFIG_PATH").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let manager = ConfigManager::load_from_file(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;
    let config = manager.config();

    init_structured_logging(config.logging.level.as_deref(), config.logging.json);
    manager.log_summary();
    info!(config_path = %config_path, "Starting query scheduler");

    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());

    let (dispatcher, mut requests) =
        ChannelDispatcher::new(config.notifications.channel_capacity);
    let drain = tokio::spawn(async move {
        while let Some(envelope) = requests.recv().await {
            info!(
                request = %envelope.request,
                origin = %envelope.origin_service,
                destination = %envelope.destination_service,
                "Remote request delivered"
            );
        }
    });

    let work_finder = LeaseMonitor::new(
        WorkFinder::from_config(store.clone(), Arc::new(dispatcher), &config.work_finder),
        config.work_finder.lease(),
    )?;
    if config.work_finder.enabled {
        work_finder.start(config.work_finder.trigger_interval());
    }

    let cache_reload = LeaseMonitor::new(
        CacheReloadJob::new("query_type_cache", Arc::new(QueryTypeCache::new(store.clone()))),
        config.cache_reload.lease(),
    )?;
    if config.cache_reload.enabled {
        cache_reload.start(config.cache_reload.trigger_interval());
    }

    info!("Query scheduler running; press Ctrl-C to stop");
    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    work_finder.stop();
    cache_reload.stop();
    drain.abort();

    info!(
        work_finder = ?work_finder.stats(),
        cache_reload = ?cache_reload.stats(),
        "Query scheduler stopped"
    );
    Ok(())
}
