//! # Task States
//!
//! Per-query bookkeeping of where each task stands in the executor tier, with
//! a cap on how many tasks of one query may run at once.

use crate::models::{QueryKey, TaskKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting for an executor to pick it up
    Ready,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Task states of one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStates {
    pub query_key: QueryKey,
    pub max_running: usize,
    pub states: BTreeMap<Uuid, TaskState>,
}

impl TaskStates {
    pub fn new(query_key: QueryKey, max_running: usize) -> Self {
        Self {
            query_key,
            max_running,
            states: BTreeMap::new(),
        }
    }

    pub fn state(&self, task_id: Uuid) -> Option<TaskState> {
        self.states.get(&task_id).copied()
    }

    pub fn running_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| **state == TaskState::Running)
            .count()
    }

    pub fn tasks_in(&self, state: TaskState) -> Vec<Uuid> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Record `state` for a task.
    ///
    /// Moving a task into `Running` is refused (returns `false`) when the
    /// query already has `max_running` other tasks running. Tasks of other
    /// queries are refused too.
    pub fn set_state(&mut self, task_key: &TaskKey, state: TaskState) -> bool {
        if task_key.query_id() != self.query_key.query_id {
            return false;
        }
        let already_running = self.state(task_key.task_id) == Some(TaskState::Running);
        if state == TaskState::Running && !already_running && self.running_count() >= self.max_running
        {
            return false;
        }
        self.states.insert(task_key.task_id, state);
        true
    }
}
