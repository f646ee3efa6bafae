//! Module definitions.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use modstore_core_store::{Key, Value};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plugin::{Pipeline, PluginSpec};
use crate::state::{State, StateMap};

/// A named read of module state.
pub type Getter = Rc<dyn Fn() -> Value>;

/// A named write of module state.
pub type Mutation = Rc<dyn Fn(&[Value])>;

type StateInit = Rc<dyn Fn() -> StateMap>;
type GettersFn = Rc<dyn Fn(&State) -> GetterMap>;
type MutationsFn = Rc<dyn Fn(&State) -> MutationMap>;

/// Getters returned by a module's getter factory.
#[derive(Clone, Default)]
pub struct GetterMap(BTreeMap<String, Getter>);

impl GetterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, getter: impl Fn() -> Value + 'static) -> Self {
        self.0.insert(name.into(), Rc::new(getter));
        self
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, Getter> {
        self.0
    }
}

/// Mutations returned by a module's mutation factory.
#[derive(Clone, Default)]
pub struct MutationMap(BTreeMap<String, Mutation>);

impl MutationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, mutation: impl Fn(&[Value]) + 'static) -> Self {
        self.0.insert(name.into(), Rc::new(mutation));
        self
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, Mutation> {
        self.0
    }
}

/// Name and version of a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub version: u32,
}

/// Everything needed to define a module.
///
/// ```rust
/// use modstore::{define_module, state_map, GetterMap, ModuleOptions, MutationMap, Value};
///
/// let counter = define_module(
///     ModuleOptions::new("counter", 1)
///         .state_init(|| state_map([("count", 0)]))
///         .getters(|state| {
///             let state = state.clone();
///             GetterMap::new().with("double", move || {
///                 Value::from(state.get("count").and_then(|v| v.as_i64()).unwrap_or(0) * 2)
///             })
///         })
///         .mutations(|state| {
///             let state = state.clone();
///             MutationMap::new().with("increment", move |_| {
///                 state.update("count", |v| *v = Value::from(v.as_i64().unwrap_or(0) + 1));
///             })
///         }),
/// )
/// .unwrap();
///
/// assert_eq!(counter.name(), "counter");
/// ```
pub struct ModuleOptions {
    name: String,
    version: u32,
    state_init: Option<StateInit>,
    getters: Option<GettersFn>,
    mutations: Option<MutationsFn>,
    plugins: Vec<PluginSpec>,
    sub_modules: BTreeMap<String, Module>,
}

impl ModuleOptions {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            state_init: None,
            getters: None,
            mutations: None,
            plugins: Vec::new(),
            sub_modules: BTreeMap::new(),
        }
    }

    pub fn state_init(mut self, f: impl Fn() -> StateMap + 'static) -> Self {
        self.state_init = Some(Rc::new(f));
        self
    }

    pub fn getters(mut self, f: impl Fn(&State) -> GetterMap + 'static) -> Self {
        self.getters = Some(Rc::new(f));
        self
    }

    pub fn mutations(mut self, f: impl Fn(&State) -> MutationMap + 'static) -> Self {
        self.mutations = Some(Rc::new(f));
        self
    }

    /// Append a plugin. Plugins run in the order they are added.
    pub fn plugin(mut self, plugin: PluginSpec) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn sub_module(mut self, key: impl Into<String>, module: Module) -> Self {
        self.sub_modules.insert(key.into(), module);
        self
    }
}

/// An immutable module definition. Clones share the same definition.
#[derive(Clone)]
pub struct Module {
    inner: Rc<ModuleInner>,
}

struct ModuleInner {
    key: Key,
    version: u32,
    state_init: Option<StateInit>,
    getters: Option<GettersFn>,
    mutations: Option<MutationsFn>,
    pipeline: OnceCell<Pipeline>,
    sub_modules: BTreeMap<String, Module>,
}

/// Validate a module or store name. Any non-empty name is accepted.
pub(crate) fn validate(name: &str, version: u32) -> Result<Key> {
    let key = Key::parse(name).map_err(|_| Error::EmptyName)?;
    if version == 0 {
        return Err(Error::InvalidVersion {
            name: name.to_string(),
            version,
        });
    }
    Ok(key)
}

/// Validate `options` and build a module, resolving its plugin factories.
pub fn define_module(options: ModuleOptions) -> Result<Module> {
    let key = validate(&options.name, options.version)?;

    let module = Module {
        inner: Rc::new(ModuleInner {
            key,
            version: options.version,
            state_init: options.state_init,
            getters: options.getters,
            mutations: options.mutations,
            pipeline: OnceCell::new(),
            sub_modules: options.sub_modules,
        }),
    };

    let pipeline = Pipeline::resolve(&options.plugins, &module);
    // Freshly created, so the cell is empty.
    let _ = module.inner.pipeline.set(pipeline);
    Ok(module)
}

impl Module {
    pub fn name(&self) -> &str {
        self.inner.key.as_str()
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// The key this module persists under.
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            name: self.name().to_string(),
            version: self.version(),
        }
    }

    /// A fresh copy of the default state, before any plugin runs.
    pub fn initial_state(&self) -> StateMap {
        self.inner
            .state_init
            .as_ref()
            .map(|f| f())
            .unwrap_or_default()
    }

    pub fn pipeline(&self) -> Pipeline {
        self.inner.pipeline.get().cloned().unwrap_or_default()
    }

    pub fn sub_modules(&self) -> &BTreeMap<String, Module> {
        &self.inner.sub_modules
    }

    pub(crate) fn build_getters(&self, state: &State) -> GetterMap {
        self.inner
            .getters
            .as_ref()
            .map(|f| f(state))
            .unwrap_or_default()
    }

    pub(crate) fn build_mutations(&self, state: &State) -> MutationMap {
        self.inner
            .mutations
            .as_ref()
            .map(|f| f(state))
            .unwrap_or_default()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("pipeline", &self.inner.pipeline.get())
            .field("sub_modules", &self.inner.sub_modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_map;

    #[test]
    fn only_empty_names_are_rejected() {
        assert!(matches!(
            define_module(ModuleOptions::new("", 1)),
            Err(Error::EmptyName)
        ));
        for name in ["User Settings", "a/b", "..", "ünïcode"] {
            let module = define_module(ModuleOptions::new(name, 1)).unwrap();
            assert_eq!(module.name(), name);
            assert_eq!(module.key().as_str(), name);
        }
    }

    #[test]
    fn rejects_version_zero() {
        assert!(matches!(
            define_module(ModuleOptions::new("counter", 0)),
            Err(Error::InvalidVersion { version: 0, .. })
        ));
    }

    #[test]
    fn missing_factories_default_to_empty() {
        let module = define_module(ModuleOptions::new("bare", 1)).unwrap();
        let state = State::default();

        assert!(module.initial_state().is_empty());
        assert!(module.build_getters(&state).into_inner().is_empty());
        assert!(module.build_mutations(&state).into_inner().is_empty());
        assert!(module.pipeline().is_empty());
    }

    #[test]
    fn state_init_runs_per_call() {
        let module = define_module(
            ModuleOptions::new("fresh", 2).state_init(|| state_map([("n", 1)])),
        )
        .unwrap();

        let mut first = module.initial_state();
        first.insert("n".to_string(), Value::from(9));
        assert_eq!(module.initial_state().get("n"), Some(&Value::from(1)));
        assert_eq!(
            module.metadata(),
            Metadata {
                name: "fresh".to_string(),
                version: 2
            }
        );
    }

    #[test]
    fn clones_share_the_definition() {
        let module = define_module(ModuleOptions::new("shared", 1)).unwrap();
        let other = module.clone();
        assert!(Rc::ptr_eq(&module.inner, &other.inner));
    }
}
