//! Module state types.

use std::collections::BTreeMap;

use modstore_core_store::Value;
use modstore_reactive::ReactiveMap;

/// The live, tracked state of one module.
pub type State = ReactiveMap<Value>;

/// A plain snapshot of module state.
pub type StateMap = BTreeMap<String, Value>;

/// Build a `StateMap` from anything convertible into fields.
///
/// ```rust
/// use modstore::{state_map, Value};
///
/// let state = state_map([("id", Value::from(0)), ("name", Value::from("x"))]);
/// assert_eq!(state.len(), 2);
/// ```
pub fn state_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> StateMap
where
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Field names whose values differ between two snapshots, including fields
/// present in only one of them.
pub(crate) fn changed_fields(current: &StateMap, previous: &StateMap) -> Vec<String> {
    let mut changed: Vec<String> = current
        .iter()
        .filter(|(k, v)| previous.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    changed.extend(
        previous
            .keys()
            .filter(|k| !current.contains_key(*k))
            .cloned(),
    );
    changed.sort();
    changed
}
