use crate::constants::properties;
use crate::models::QueryKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot of a query's progress.
///
/// Checkpoints are values: producing a new snapshot builds a new checkpoint,
/// the stored one is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCheckpoint {
    query_key: QueryKey,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl QueryCheckpoint {
    pub fn new(query_key: QueryKey, properties: BTreeMap<String, Value>) -> Self {
        Self {
            query_key,
            properties,
        }
    }

    /// Initial checkpoint for a freshly submitted query
    pub fn for_query(query_key: QueryKey, query_payload: Value) -> Self {
        let mut props = BTreeMap::new();
        props.insert(properties::QUERY.to_string(), query_payload);
        Self::new(query_key, props)
    }

    /// Returns a new checkpoint with `key` set to `value`
    #[must_use]
    pub fn with_property(&self, key: impl Into<String>, value: Value) -> Self {
        let mut props = self.properties.clone();
        props.insert(key.into(), value);
        Self::new(self.query_key.clone(), props)
    }

    pub fn query_key(&self) -> &QueryKey {
        &self.query_key
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The raw query payload recorded at submission, if any
    pub fn query_payload(&self) -> Option<&Value> {
        self.property(properties::QUERY)
    }
}
