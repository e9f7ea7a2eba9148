use proptest::prelude::*;
use querytask_core::models::{QueryAction, QueryCheckpoint, QueryKey, QueryType};
use serde_json::Value;
use uuid::Uuid;

/// Strategy for generating query type names
pub fn query_type_strategy() -> impl Strategy<Value = QueryType> {
    "[A-Z][a-zA-Z0-9_:.-]{0,31}".prop_map(QueryType::new)
}

pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

pub fn query_key_strategy() -> impl Strategy<Value = QueryKey> {
    (query_type_strategy(), uuid_strategy())
        .prop_map(|(query_type, query_id)| QueryKey::new(query_type, query_id))
}

pub fn action_strategy() -> impl Strategy<Value = QueryAction> {
    prop::sample::select(QueryAction::ALL.to_vec())
}

/// Arbitrary JSON, including nested objects and arrays of mixed scalars
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-4000i32..4000).prop_map(|n| Value::from(f64::from(n) / 4.0)),
        "[a-zA-Z0-9 '=_]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

pub fn checkpoint_strategy() -> impl Strategy<Value = QueryCheckpoint> {
    (
        query_key_strategy(),
        prop::collection::btree_map("[a-z_]{1,12}", json_value_strategy(), 0..5),
    )
        .prop_map(|(key, properties)| QueryCheckpoint::new(key, properties))
}
