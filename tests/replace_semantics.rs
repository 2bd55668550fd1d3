//! Inserts and updates replace the full declared attribute set.

use entity_store::{
    attributes, AttributeMap, AttributeType, EntityDescription, Model, PersistentContainer,
    RecordStore, Value,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

const DECLARED: [&str; 4] = ["a", "b", "c", "d"];

fn store() -> RecordStore {
    let mut entity = EntityDescription::new("Item");
    for name in DECLARED {
        entity = entity.attribute(name, AttributeType::Json);
    }
    RecordStore::with_container(Arc::new(PersistentContainer::in_memory(
        Model::new().with_entity(entity),
    )))
}

#[test]
fn test_update_clears_unmentioned_attributes() {
    let store = store();
    let mut item = store
        .add("Item", &attributes([("a", json!(1)), ("b", json!(2))]), true)
        .unwrap()
        .unwrap();

    assert!(store.update(&mut item, &attributes([("a", json!(9))]), true).unwrap());

    let fetched = store.fetch("Item", None).unwrap().unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].get("a"), Some(&json!(9)));
    assert_eq!(fetched[0].get("b"), Some(&Value::Null));
}

#[test]
fn test_update_with_full_map_preserves_everything() {
    let store = store();
    let initial = attributes([("a", json!(1)), ("b", json!("two")), ("c", json!([3]))]);
    let mut item = store.add("Item", &initial, true).unwrap().unwrap();

    let mut full = item.attributes.clone();
    full.insert("d".into(), json!({"four": 4}));
    assert!(store.update(&mut item, &full, true).unwrap());

    let fetched = &store.fetch("Item", None).unwrap().unwrap()[0];
    assert_eq!(fetched.attributes, full);
}

#[test]
fn test_empty_update_nulls_everything() {
    let store = store();
    let mut item = store
        .add("Item", &attributes([("a", json!(1)), ("c", json!(true))]), true)
        .unwrap()
        .unwrap();

    assert!(store.update(&mut item, &AttributeMap::new(), true).unwrap());
    assert!(DECLARED.iter().all(|k| item.is_null(k)));
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn partial_map() -> impl Strategy<Value = AttributeMap> {
    proptest::collection::btree_map(
        prop::sample::select(DECLARED.to_vec()).prop_map(String::from),
        value_strategy(),
        0..=DECLARED.len(),
    )
}

proptest! {
    #[test]
    fn prop_add_assigns_declared_from_map(input in partial_map()) {
        let store = store();
        store.add("Item", &input, false).unwrap().unwrap();

        let fetched = store.fetch("Item", None).unwrap().unwrap();
        prop_assert_eq!(fetched.len(), 1);
        for key in DECLARED {
            let expected = input.get(key).cloned().unwrap_or(Value::Null);
            prop_assert_eq!(fetched[0].get(key), Some(&expected));
        }
    }

    #[test]
    fn prop_update_replaces_not_merges(first in partial_map(), second in partial_map()) {
        let store = store();
        let mut item = store.add("Item", &first, true).unwrap().unwrap();
        prop_assert!(store.update(&mut item, &second, false).unwrap());

        let fetched = store.fetch("Item", None).unwrap().unwrap();
        for key in DECLARED {
            let expected = second.get(key).cloned().unwrap_or(Value::Null);
            prop_assert_eq!(fetched[0].get(key), Some(&expected));
            prop_assert_eq!(item.get(key), Some(&expected));
        }
    }
}
