//! # Query and Task Identity
//!
//! Value types naming a query (`QueryKey`) and a task belonging to a query
//! (`TaskKey`). Both render to stable string keys used as the store keyspace.
//!
//! A `TaskKey` deliberately carries no action: checkpoint updates may move a
//! task from CREATE to NEXT and its identity must not change.

use crate::constants::keys::{QUERY_PREFIX, TASK_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Named classification of a query (e.g. `EventQuery`, `CountQuery`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryType(String);

impl QueryType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QueryType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identifies one logical query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub query_type: QueryType,
    pub query_id: Uuid,
}

impl QueryKey {
    pub fn new(query_type: impl Into<QueryType>, query_id: Uuid) -> Self {
        Self {
            query_type: query_type.into(),
            query_id,
        }
    }

    /// Key prefix shared by every entry belonging to `query_id`
    pub fn id_prefix(query_id: Uuid) -> String {
        format!("{QUERY_PREFIX}{query_id}")
    }

    /// Stable storage rendering.
    ///
    /// The fixed-width id precedes the free-form type name, so distinct
    /// `(type, id)` pairs can never render to the same key.
    pub fn to_key(&self) -> String {
        format!("{}:{}", Self::id_prefix(self.query_id), self.query_type)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// Identifies one task belonging to a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub task_id: Uuid,
    pub query_key: QueryKey,
}

impl TaskKey {
    pub fn new(task_id: Uuid, query_key: QueryKey) -> Self {
        Self { task_id, query_key }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_key.query_id
    }

    pub fn query_type(&self) -> &QueryType {
        &self.query_key.query_type
    }

    pub fn to_key(&self) -> String {
        format!("{TASK_PREFIX}{}:{}", self.task_id, self.query_key.to_key())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_query_key_rendering_is_stable() {
        let id = Uuid::new_v4();
        let a = QueryKey::new("EventQuery", id);
        let b = QueryKey::new("EventQuery", id);
        assert_eq!(a, b);
        assert_eq!(a.to_key(), b.to_key());
        assert!(a.to_key().starts_with(&QueryKey::id_prefix(id)));
    }

    #[test]
    fn test_query_key_rendering_distinguishes_type_and_id() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let keys: HashSet<String> = [
            QueryKey::new("EventQuery", id),
            QueryKey::new("CountQuery", id),
            QueryKey::new("EventQuery", other),
            QueryKey::new("Event:Query", id),
        ]
        .iter()
        .map(QueryKey::to_key)
        .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_task_key_accessors() {
        let query_key = QueryKey::new("EventQuery", Uuid::new_v4());
        let task_id = Uuid::new_v4();
        let task_key = TaskKey::new(task_id, query_key.clone());

        assert_eq!(task_key.query_id(), query_key.query_id);
        assert_eq!(task_key.query_type().as_str(), "EventQuery");
        assert!(task_key.to_key().starts_with(TASK_PREFIX));
        assert!(task_key.to_key().ends_with(&query_key.to_key()));
    }

    #[test]
    fn test_query_type_serializes_transparently() {
        let json = serde_json::to_string(&QueryType::new("EventQuery")).unwrap();
        assert_eq!(json, "\"EventQuery\"");
    }
}
