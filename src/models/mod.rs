pub mod checkpoint;
pub mod query_key;
pub mod query_state;
pub mod query_task;
pub mod task_states;

// Re-export core models for easy access
pub use checkpoint::QueryCheckpoint;
pub use query_key::{QueryKey, QueryType, TaskKey};
pub use query_state::{QueryState, QueryStatus};
pub use query_task::{QueryAction, QueryTask, QueryTaskNotification, TaskDescription};
pub use task_states::{TaskState, TaskStates};
