use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a query as seen by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLifecycle {
    /// Query has been recorded but no task exists for it yet
    Defined,
    /// Initial CREATE task has been persisted and announced
    Created,
    /// Executor tier is actively producing results
    Running,
    /// Query finished normally
    Closed,
    /// Query was cancelled by a client or operator
    Canceled,
    /// Query failed with an error
    Failed,
}

impl QueryLifecycle {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Canceled | Self::Failed)
    }

    /// Check if queries in this state should be pushed forward with NEXT
    pub fn should_advance(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle transition.
    ///
    /// Re-entering the current state is always accepted so that at-least-once
    /// writers from the executor tier stay idempotent.
    pub fn can_transition_to(&self, next: QueryLifecycle) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Defined => matches!(next, Self::Created | Self::Canceled | Self::Failed),
            Self::Created => matches!(
                next,
                Self::Running | Self::Closed | Self::Canceled | Self::Failed
            ),
            Self::Running => matches!(next, Self::Closed | Self::Canceled | Self::Failed),
            Self::Closed | Self::Canceled | Self::Failed => false,
        }
    }
}

impl fmt::Display for QueryLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined => write!(f, "defined"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Closed => write!(f, "closed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for QueryLifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defined" => Ok(Self::Defined),
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "closed" => Ok(Self::Closed),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid query lifecycle state: {s}")),
        }
    }
}

impl Default for QueryLifecycle {
    fn default() -> Self {
        Self::Defined
    }
}
