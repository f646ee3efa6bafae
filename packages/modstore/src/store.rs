//! Stores: several modules persisted together under one version gate.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use modstore_core_store::{Key, Value};
use modstore_reactive::Subscription;
use modstore_serde_store::{JsonCodec, TypedReader, TypedWriter};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::flatten::{assemble, FlattenedModule};
use crate::module::{validate, Module};
use crate::persist::SharedStore;
use crate::state::{State, StateMap};

/// The record a store is persisted as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreEnvelope {
    pub state: BTreeMap<String, StateMap>,
    pub version: u32,
}

/// Everything needed to define a store.
pub struct StoreOptions {
    name: String,
    version: u32,
    backend: SharedStore,
    modules: Vec<(String, Module)>,
}

impl StoreOptions {
    pub fn new(name: impl Into<String>, version: u32, backend: SharedStore) -> Self {
        Self {
            name: name.into(),
            version,
            backend,
            modules: Vec::new(),
        }
    }

    /// Add a module under `key`.
    pub fn module(mut self, key: impl Into<String>, module: Module) -> Self {
        self.modules.push((key.into(), module));
        self
    }
}

/// A set of modules whose states are saved together.
///
/// Module plugins are not run for store modules or their sub-modules; the
/// store itself restores every state and saves the whole envelope on every
/// commit of any of them. A sub-module's state is nested in its parent's
/// entry under the sub-module key.
pub struct Store {
    shared: Rc<Shared>,
    modules: BTreeMap<String, FlattenedModule>,
    _subscriptions: Vec<Subscription>,
}

struct Shared {
    key: Key,
    version: u32,
    backend: SharedStore,
    modules: BTreeMap<String, Node>,
}

/// The live state of one store module and its sub-modules.
struct Node {
    state: State,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn snapshot(&self) -> StateMap {
        let mut snapshot = self.state.snapshot();
        for (key, child) in &self.children {
            snapshot.insert(key.clone(), Value::Map(child.snapshot()));
        }
        snapshot
    }

    fn states(&self) -> Vec<State> {
        let mut states = vec![self.state.clone()];
        for child in self.children.values() {
            states.extend(child.states());
        }
        states
    }
}

impl Shared {
    fn envelope(&self) -> StoreEnvelope {
        StoreEnvelope {
            state: self
                .modules
                .iter()
                .map(|(key, node)| (key.clone(), node.snapshot()))
                .collect(),
            version: self.version,
        }
    }

    fn save(&self) -> Result<()> {
        self.backend
            .borrow_mut()
            .write_as(&self.key, &self.envelope())?;
        Ok(())
    }

    fn load(&self) -> Option<StoreEnvelope> {
        let stored = self
            .backend
            .borrow_mut()
            .read_as::<StoreEnvelope>(&self.key, &JsonCodec);
        match stored {
            Ok(Some(envelope)) => Some(envelope),
            Ok(None) => {
                info!(
                    store = %self.key,
                    version = self.version,
                    "no saved store state, starting from module defaults"
                );
                None
            }
            Err(err) => {
                warn!(store = %self.key, error = %err, "ignoring unreadable store state");
                None
            }
        }
    }
}

/// Rebuild `module` and its sub-modules from `stored`, or from their
/// defaults when nothing usable was stored. No plugin runs.
fn restore(
    module: &Module,
    stored: Option<StateMap>,
    restored_all: &mut bool,
) -> Result<(Node, FlattenedModule)> {
    let from_envelope = stored.is_some();
    let mut initial = stored.unwrap_or_else(|| {
        *restored_all = false;
        module.initial_state()
    });

    let mut children = BTreeMap::new();
    let mut handles = BTreeMap::new();
    for (key, sub_module) in module.sub_modules() {
        let nested = if from_envelope {
            match initial.remove(key) {
                Some(Value::Map(nested)) => Some(nested),
                Some(other) => {
                    warn!(
                        module = %module.name(),
                        sub_module = %key,
                        kind = %other.kind(),
                        "ignoring stored sub-module state that is not a map"
                    );
                    None
                }
                None => None,
            }
        } else {
            None
        };
        let (node, handle) = restore(sub_module, nested, restored_all)?;
        children.insert(key.clone(), node);
        handles.insert(key.clone(), handle);
    }

    let state = State::new(initial);
    let handle = assemble(module, state.clone(), None, handles)?;
    Ok((Node { state, children }, handle))
}

/// Validate `options`, restore module states from the backend and flatten
/// every module against its restored state.
///
/// A stored envelope is only used when its version equals the store's;
/// otherwise every module starts from its own default state. Modules (and
/// sub-modules) missing from a usable envelope also start from their
/// defaults. Unless every module was restored, the envelope is written back
/// right away.
pub fn define_store(options: StoreOptions) -> Result<Store> {
    let key = validate(&options.name, options.version)?;

    let mut seen = std::collections::BTreeSet::new();
    for (module_key, _) in &options.modules {
        if !seen.insert(module_key.as_str()) {
            return Err(Error::NameCollision {
                module: options.name.clone(),
                name: module_key.clone(),
            });
        }
    }

    let mut shared = Shared {
        key,
        version: options.version,
        backend: options.backend,
        modules: BTreeMap::new(),
    };

    let mut stored = match shared.load() {
        Some(envelope) if envelope.version == shared.version => envelope.state,
        Some(envelope) => {
            warn!(
                store = %shared.key,
                from = envelope.version,
                to = shared.version,
                "discarding store state saved by another version"
            );
            BTreeMap::new()
        }
        None => BTreeMap::new(),
    };

    let mut restored_all = true;
    let mut modules = BTreeMap::new();
    for (module_key, module) in &options.modules {
        let (node, handle) = restore(module, stored.remove(module_key), &mut restored_all)?;
        shared.modules.insert(module_key.clone(), node);
        modules.insert(module_key.clone(), handle);
    }

    let shared = Rc::new(shared);
    if !restored_all {
        shared.save()?;
    }

    let subscriptions = shared
        .modules
        .values()
        .flat_map(Node::states)
        .map(|state| {
            let weak: Weak<Shared> = Rc::downgrade(&shared);
            state.watch(move |_, _| {
                if let Some(shared) = weak.upgrade() {
                    if let Err(err) = shared.save() {
                        error!(store = %shared.key, error = %err, "failed to persist store state");
                    }
                }
            })
        })
        .collect();

    Ok(Store {
        shared,
        modules,
        _subscriptions: subscriptions,
    })
}

impl Store {
    pub fn name(&self) -> &str {
        self.shared.key.as_str()
    }

    pub fn version(&self) -> u32 {
        self.shared.version
    }

    /// The flattened module stored under `key`.
    pub fn module(&self, key: &str) -> Option<&FlattenedModule> {
        self.modules.get(key)
    }

    pub fn modules(&self) -> impl Iterator<Item = (&str, &FlattenedModule)> {
        self.modules.iter().map(|(k, m)| (k.as_str(), m))
    }

    /// Current states of every module, as they would be saved.
    pub fn envelope(&self) -> StoreEnvelope {
        self.shared.envelope()
    }

    /// Write the envelope to the backend now.
    pub fn save(&self) -> Result<()> {
        self.shared.save()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("modules", &self.modules)
            .finish()
    }
}
