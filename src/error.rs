//! Error types for the query task scheduler.

use crate::config::ConfigurationError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: Uuid },
    #[error("Query not found: {query_id}")]
    QueryNotFound { query_id: Uuid },
    #[error("Invalid state transition for query {query_id}: {from} -> {to}")]
    InvalidStateTransition {
        query_id: Uuid,
        from: String,
        to: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Dispatch error for {action} on query {query_id}: {reason}")]
    DispatchError {
        action: String,
        query_id: Uuid,
        reason: String,
    },
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Job error in {job}: {reason}")]
    JobError { job: String, reason: String },
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl SchedulerError {
    pub fn dispatch(action: impl ToString, query_id: Uuid, reason: impl Into<String>) -> Self {
        Self::DispatchError {
            action: action.to_string(),
            query_id,
            reason: reason.into(),
        }
    }

    pub fn job(job: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JobError {
            job: job.into(),
            reason: reason.into(),
        }
    }

    /// True for errors describing a missing task or query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. } | Self::QueryNotFound { .. })
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(error: serde_json::Error) -> Self {
        SchedulerError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for SchedulerError {
    fn from(error: ConfigurationError) -> Self {
        SchedulerError::ConfigurationError(error.to_string())
    }
}

impl From<::config::ConfigError> for SchedulerError {
    fn from(error: ::config::ConfigError) -> Self {
        SchedulerError::ConfigurationError(error.to_string())
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
