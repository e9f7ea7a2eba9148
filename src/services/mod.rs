//! Read-only services layered over the task store.

pub mod query_introspection;

pub use query_introspection::{QueryIntrospectionService, RunningQuery};
