//! # Query Tasks
//!
//! A `QueryTask` is one schedulable, checkpointed unit of work. Its `task_id`
//! is allocated once and survives every checkpoint update; only the
//! checkpoint payload is replaced.

use crate::models::{QueryCheckpoint, QueryKey, TaskKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Work a task asks the executor tier to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryAction {
    Create,
    Plan,
    Predict,
    Next,
    Close,
    Cancel,
}

impl QueryAction {
    pub const ALL: [QueryAction; 6] = [
        Self::Create,
        Self::Plan,
        Self::Predict,
        Self::Next,
        Self::Close,
        Self::Cancel,
    ];

    /// CLOSE and CANCEL end a query; everything else is forward work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Close | Self::Cancel)
    }
}

impl fmt::Display for QueryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Plan => write!(f, "PLAN"),
            Self::Predict => write!(f, "PREDICT"),
            Self::Next => write!(f, "NEXT"),
            Self::Close => write!(f, "CLOSE"),
            Self::Cancel => write!(f, "CANCEL"),
        }
    }
}

impl std::str::FromStr for QueryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "PLAN" => Ok(Self::Plan),
            "PREDICT" => Ok(Self::Predict),
            "NEXT" => Ok(Self::Next),
            "CLOSE" => Ok(Self::Close),
            "CANCEL" => Ok(Self::Cancel),
            _ => Err(format!("Invalid query action: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTask {
    task_id: Uuid,
    action: QueryAction,
    checkpoint: QueryCheckpoint,
}

impl QueryTask {
    /// Build a task with a freshly allocated id
    pub fn new(action: QueryAction, checkpoint: QueryCheckpoint) -> Self {
        Self::with_id(Uuid::new_v4(), action, checkpoint)
    }

    pub fn with_id(task_id: Uuid, action: QueryAction, checkpoint: QueryCheckpoint) -> Self {
        Self {
            task_id,
            action,
            checkpoint,
        }
    }

    /// Same task id and action, new checkpoint
    #[must_use]
    pub fn checkpointed(&self, checkpoint: QueryCheckpoint) -> Self {
        Self::with_id(self.task_id, self.action, checkpoint)
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn action(&self) -> QueryAction {
        self.action
    }

    pub fn checkpoint(&self) -> &QueryCheckpoint {
        &self.checkpoint
    }

    pub fn query_key(&self) -> &QueryKey {
        self.checkpoint.query_key()
    }

    pub fn task_key(&self) -> TaskKey {
        TaskKey::new(self.task_id, self.checkpoint.query_key().clone())
    }

    pub fn notification(&self) -> QueryTaskNotification {
        QueryTaskNotification {
            task_key: self.task_key(),
            action: self.action,
        }
    }
}

/// Message announcing a new task to the executor tier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryTaskNotification {
    pub task_key: TaskKey,
    pub action: QueryAction,
}

/// Read-only projection of a task for listing and introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub task_key: TaskKey,
    pub action: QueryAction,
    pub parameters: BTreeMap<String, String>,
}

impl From<&QueryTask> for TaskDescription {
    fn from(task: &QueryTask) -> Self {
        let parameters = task
            .checkpoint()
            .properties()
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect();

        Self {
            task_key: task.task_key(),
            action: task.action(),
            parameters,
        }
    }
}
