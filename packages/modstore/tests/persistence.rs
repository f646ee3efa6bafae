use std::cell::RefCell;
use std::rc::Rc;

use modstore::{
    define_module, flatten, key, persistence, state_map, InMemoryStore, JsonLocalStore, Module,
    ModuleOptions, MutationMap, PersistedPayload, PluginHooks, PluginSpec, SharedStore, StateMap,
    Value,
};
use modstore_core_store::{Error, Key, Reader, Record, Writer};
use modstore_serde_store::{JsonCodec, TypedReader};

fn old_state() -> StateMap {
    state_map([("id", Value::from(0)), ("name", Value::from(""))])
}

fn new_state() -> StateMap {
    state_map([("id", 0), ("age", 5)])
}

fn test_module(version: u32, state_init: fn() -> StateMap, backend: SharedStore) -> Module {
    define_module(
        ModuleOptions::new("test", version)
            .state_init(state_init)
            .mutations(|state| {
                let state = state.clone();
                MutationMap::new().with("update_id", move |args| {
                    state.set("id", args[0].clone());
                })
            })
            .plugin(persistence(backend)),
    )
    .unwrap()
}

fn stored(backend: &Rc<RefCell<InMemoryStore>>) -> Option<PersistedPayload> {
    backend
        .borrow_mut()
        .read_as(&key!("test"), &JsonCodec)
        .unwrap()
}

#[test]
fn saves_on_init_and_after_each_mutation() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    let handle = flatten(&test_module(1, old_state, backend.clone())).unwrap();
    assert_eq!(handle.value("id"), Some(Value::from(0)));
    assert_eq!(stored(&backend).unwrap().state, old_state());

    handle.call("update_id", &[Value::from(1)]).unwrap();

    let payload = stored(&backend).unwrap();
    assert_eq!(payload.version, 1);
    assert_eq!(payload.state.get("id"), Some(&Value::from(1)));
}

#[test]
fn same_version_restores_stored_state_verbatim() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    let first = flatten(&test_module(1, old_state, backend.clone())).unwrap();
    first.call("update_id", &[Value::from(8)]).unwrap();
    drop(first);

    let second = flatten(&test_module(1, old_state, backend.clone())).unwrap();
    assert_eq!(second.value("id"), Some(Value::from(8)));
    assert_eq!(second.value("name"), Some(Value::from("")));
}

#[test]
fn version_change_migrates_by_key_and_kind() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    let old = flatten(&test_module(1, old_state, backend.clone())).unwrap();
    old.call("update_id", &[Value::from(1)]).unwrap();

    let new = flatten(&test_module(2, new_state, backend.clone())).unwrap();
    assert_eq!(new.value("id"), Some(Value::from(1)));
    assert_eq!(new.value("age"), Some(Value::from(5)));
    assert!(new.get("name").is_none());

    // Migrated state is written back under the new version straight away.
    let payload = stored(&backend).unwrap();
    assert_eq!(payload.version, 2);
    assert_eq!(payload.state, state_map([("id", 1), ("age", 5)]));

    new.call("update_id", &[Value::from(2)]).unwrap();
    let payload = stored(&backend).unwrap();
    assert_eq!(payload.state, state_map([("id", 2), ("age", 5)]));
}

#[test]
fn mismatched_kinds_fall_back_to_defaults() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    backend.borrow_mut().write_raw(
        &key!("test"),
        &br#"{"__version":1,"state":{"id":"seven","age":3.5}}"#[..],
    );

    let handle = flatten(&test_module(2, new_state, backend.clone())).unwrap();
    assert_eq!(handle.value("id"), Some(Value::from(0)));
    assert_eq!(handle.value("age"), Some(Value::from(3.5)));
}

#[test]
fn malformed_payloads_are_treated_as_absent() {
    for raw in [&b"not json"[..], &br#"{"state":{"id":3}}"#[..], &b"[1,2]"[..]] {
        let backend = Rc::new(RefCell::new(InMemoryStore::new()));
        backend.borrow_mut().write_raw(&key!("test"), raw);

        let handle = flatten(&test_module(1, old_state, backend.clone())).unwrap();
        assert_eq!(handle.value("id"), Some(Value::from(0)));
        assert_eq!(stored(&backend).unwrap().state, old_state());
    }
}

#[test]
fn writes_from_an_earlier_plugin_are_persisted() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    let module = touching_module(vec![touch(), persistence(backend.clone())]);
    let handle = flatten(&module).unwrap();

    handle.call("update_id", &[Value::from(1)]).unwrap();

    let payload = stored(&backend).unwrap();
    assert_eq!(payload.state.get("id"), Some(&Value::from(1)));
    assert_eq!(payload.state.get("name"), Some(&Value::from("touched")));
}

fn touching_module(plugins: Vec<PluginSpec>) -> Module {
    let options = ModuleOptions::new("test", 1)
        .state_init(old_state)
        .mutations(|state| {
            let state = state.clone();
            MutationMap::new().with("update_id", move |args| {
                state.set("id", args[0].clone());
            })
        });
    let options = plugins
        .into_iter()
        .fold(options, |options, plugin| options.plugin(plugin));
    define_module(options).unwrap()
}

fn touch() -> PluginSpec {
    PluginSpec::instance(PluginHooks::new().on_data_change(|state, _| {
        state.set("name", Value::from("touched"));
    }))
}

#[test]
fn writes_from_a_later_plugin_are_persisted() {
    let backend = Rc::new(RefCell::new(InMemoryStore::new()));
    let module = touching_module(vec![persistence(backend.clone()), touch()]);
    let handle = flatten(&module).unwrap();

    handle.call("update_id", &[Value::from(1)]).unwrap();

    let payload = stored(&backend).unwrap();
    assert_eq!(payload.state.get("id"), Some(&Value::from(1)));
    assert_eq!(payload.state.get("name"), Some(&Value::from("touched")));

    drop(handle);
    let reopened = flatten(&module).unwrap();
    assert_eq!(reopened.value("name"), Some(Value::from("touched")));
}

#[test]
fn payloads_round_trip_through_json() {
    let payload = PersistedPayload {
        state: state_map([("id", Value::from(1)), ("tags", Value::from(vec!["a", "b"]))]),
        version: 4,
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert_eq!(json, r#"{"state":{"id":1,"tags":["a","b"]},"__version":4}"#);

    let back: PersistedPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
    assert_eq!(serde_json::to_string(&back).unwrap(), json);
}

#[test]
fn records_on_disk_have_sorted_keys() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Rc::new(RefCell::new(
        JsonLocalStore::open(dir.path().to_path_buf()).unwrap(),
    ));

    let handle = flatten(&test_module(1, old_state, backend.clone())).unwrap();
    handle.call("update_id", &[Value::from(3)]).unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("test.json")).unwrap();
    assert_eq!(on_disk, r#"{"__version":1,"state":{"id":3,"name":""}}"#);

    drop(handle);
    let reopened = flatten(&test_module(1, old_state, backend)).unwrap();
    assert_eq!(reopened.value("id"), Some(Value::from(3)));
}

struct FailingWrites;

impl Reader for FailingWrites {
    fn read(&mut self, _from: &Key) -> Result<Option<Record>, Error> {
        Ok(None)
    }
}

impl Writer for FailingWrites {
    fn write(&mut self, _to: &Key, _data: Record) -> Result<Key, Error> {
        Err(Error::other("read-only backend"))
    }
}

#[test]
fn backend_write_failures_do_not_break_mutations() {
    let backend = Rc::new(RefCell::new(FailingWrites));
    let handle = flatten(&test_module(1, old_state, backend)).unwrap();

    handle.call("update_id", &[Value::from(6)]).unwrap();
    assert_eq!(handle.value("id"), Some(Value::from(6)));
}
