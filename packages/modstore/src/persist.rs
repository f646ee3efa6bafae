//! Versioned persistence of module state.
//!
//! Each module is stored under its own name as
//! `{"__version": <version>, "state": {...}}`. When the stored version
//! differs from the module's, the stored state is migrated into the new
//! default state: a field keeps its stored value only if the new defaults
//! have the field and the stored value has the same kind as the default.

use std::cell::RefCell;
use std::rc::Rc;

use modstore_core_store::{Key, Store};
use modstore_serde_store::{JsonCodec, TypedReader, TypedWriter};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::plugin::{Plugin, PluginSpec};
use crate::state::{State, StateMap};

/// A backend shared by every module and store that persists through it.
pub type SharedStore = Rc<RefCell<dyn Store>>;

/// Wrap a backend for sharing.
pub fn share(store: impl Store + 'static) -> SharedStore {
    Rc::new(RefCell::new(store))
}

/// The record a persisted module is stored as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedPayload {
    pub state: StateMap,
    #[serde(rename = "__version")]
    pub version: u32,
}

/// Carry stored fields forward into `defaults`.
///
/// Fields only present in `stored` are dropped; fields whose stored value
/// is of a different kind than the default keep the default.
///
/// ```rust
/// use modstore::{migrate, state_map, Value};
///
/// let stored = state_map([("id", Value::from(7)), ("name", Value::from("x"))]);
/// let defaults = state_map([("id", Value::from(0)), ("age", Value::from(5))]);
///
/// let migrated = migrate(&stored, defaults);
/// assert_eq!(migrated, state_map([("id", 7), ("age", 5)]));
/// ```
pub fn migrate(stored: &StateMap, defaults: StateMap) -> StateMap {
    defaults
        .into_iter()
        .map(|(key, default)| match stored.get(&key) {
            Some(value) if value.same_kind(&default) => (key, value.clone()),
            _ => (key, default),
        })
        .collect()
}

/// A plugin persisting its module through `backend`.
///
/// On init the stored record replaces, or is migrated into, the draft
/// state; every commit afterwards writes the whole state back.
pub fn persistence(backend: SharedStore) -> PluginSpec {
    PluginSpec::factory(move |module| {
        Rc::new(Persistence {
            backend: backend.clone(),
            key: module.key().clone(),
            version: module.version(),
        })
    })
}

struct Persistence {
    backend: SharedStore,
    key: Key,
    version: u32,
}

impl Persistence {
    fn load(&self) -> Option<PersistedPayload> {
        let stored = self
            .backend
            .borrow_mut()
            .read_as::<PersistedPayload>(&self.key, &JsonCodec);
        match stored {
            Ok(payload) => payload,
            Err(err) => {
                warn!(module = %self.key, error = %err, "ignoring unreadable persisted state");
                None
            }
        }
    }

    fn save(&self, state: StateMap) {
        let payload = PersistedPayload {
            state,
            version: self.version,
        };
        if let Err(err) = self.backend.borrow_mut().write_as(&self.key, &payload) {
            error!(module = %self.key, error = %err, "failed to persist state");
        }
    }
}

impl Plugin for Persistence {
    fn on_state_init(&self, draft: StateMap) -> StateMap {
        match self.load() {
            None => {
                self.save(draft.clone());
                draft
            }
            Some(payload) if payload.version == self.version => payload.state,
            Some(payload) => {
                warn!(
                    module = %self.key,
                    from = payload.version,
                    to = self.version,
                    "migrating persisted state"
                );
                let migrated = migrate(&payload.state, draft);
                self.save(migrated.clone());
                migrated
            }
        }
    }

    fn on_data_change(&self, state: &State, _previous: &StateMap) {
        self.save(state.snapshot());
    }
}
