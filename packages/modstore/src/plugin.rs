//! Lifecycle hooks attached to a module.
//!
//! A module carries an ordered list of [`PluginSpec`]s. When the module is
//! defined, every spec is resolved into a [`Plugin`] and the results form the
//! module's [`Pipeline`]:
//!
//! - at flatten time the pipeline folds `on_state_init` over the initial
//!   state, in declaration order, each hook receiving the previous output;
//! - on every commit it calls `on_data_change` on each plugin, in
//!   declaration order, with the live state and the previous snapshot.

use std::fmt;
use std::rc::Rc;

use crate::module::Module;
use crate::state::{changed_fields, State, StateMap};

/// A bundle of lifecycle hooks. Both hooks default to doing nothing.
///
/// Writes made from `on_data_change` start another commit, delivered to
/// every plugin again (earlier ones included), so a hook that writes must
/// converge: writing the same value twice has to be a no-op. Hooks should be
/// idempotent for the same reason.
pub trait Plugin {
    /// Transform the initial state. The returned map replaces the input.
    fn on_state_init(&self, state: StateMap) -> StateMap {
        state
    }

    /// Observe a committed change.
    fn on_data_change(&self, _state: &State, _previous: &StateMap) {}
}

/// Builds a plugin for the module it is attached to.
pub type PluginFactory = Rc<dyn Fn(&Module) -> Rc<dyn Plugin>>;

/// How a plugin is supplied to a module.
#[derive(Clone)]
pub enum PluginSpec {
    /// Called once when the module is defined, with the module itself.
    Factory(PluginFactory),
    /// An already built plugin, shared as is.
    Instance(Rc<dyn Plugin>),
}

impl PluginSpec {
    pub fn factory(f: impl Fn(&Module) -> Rc<dyn Plugin> + 'static) -> Self {
        PluginSpec::Factory(Rc::new(f))
    }

    pub fn instance(plugin: impl Plugin + 'static) -> Self {
        PluginSpec::Instance(Rc::new(plugin))
    }

    fn resolve(&self, module: &Module) -> Rc<dyn Plugin> {
        match self {
            PluginSpec::Factory(factory) => factory(module),
            PluginSpec::Instance(plugin) => plugin.clone(),
        }
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSpec::Factory(_) => f.write_str("PluginSpec::Factory"),
            PluginSpec::Instance(_) => f.write_str("PluginSpec::Instance"),
        }
    }
}

type InitHook = Box<dyn Fn(StateMap) -> StateMap>;
type ChangeHook = Box<dyn Fn(&State, &StateMap)>;

/// A plugin made of closures, for hooks that need no state of their own.
///
/// ```rust
/// use modstore::{PluginHooks, PluginSpec, Value};
///
/// let seed_id = PluginSpec::instance(PluginHooks::new().on_state_init(|mut state| {
///     state.insert("id".to_string(), Value::from(100));
///     state
/// }));
/// # let _ = seed_id;
/// ```
#[derive(Default)]
pub struct PluginHooks {
    init: Option<InitHook>,
    change: Option<ChangeHook>,
}

impl PluginHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_state_init(mut self, hook: impl Fn(StateMap) -> StateMap + 'static) -> Self {
        self.init = Some(Box::new(hook));
        self
    }

    pub fn on_data_change(mut self, hook: impl Fn(&State, &StateMap) + 'static) -> Self {
        self.change = Some(Box::new(hook));
        self
    }
}

impl Plugin for PluginHooks {
    fn on_state_init(&self, state: StateMap) -> StateMap {
        match &self.init {
            Some(hook) => hook(state),
            None => state,
        }
    }

    fn on_data_change(&self, state: &State, previous: &StateMap) {
        if let Some(hook) = &self.change {
            hook(state, previous);
        }
    }
}

/// The resolved, ordered plugins of one module.
#[derive(Clone, Default)]
pub struct Pipeline {
    plugins: Vec<Rc<dyn Plugin>>,
}

impl Pipeline {
    pub(crate) fn resolve(specs: &[PluginSpec], module: &Module) -> Self {
        Self {
            plugins: specs.iter().map(|spec| spec.resolve(module)).collect(),
        }
    }

    /// Fold every `on_state_init` hook over `state`.
    pub fn init(&self, state: StateMap) -> StateMap {
        self.plugins
            .iter()
            .fold(state, |acc, plugin| plugin.on_state_init(acc))
    }

    /// Deliver one commit to every plugin.
    pub fn data_change(&self, state: &State, previous: &StateMap) {
        for plugin in &self.plugins {
            plugin.on_data_change(state, previous);
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

/// Emits a `tracing` debug event naming the fields each commit changed.
pub struct ChangeLog {
    module: String,
}

impl ChangeLog {
    /// A spec that logs under the owning module's name.
    pub fn spec() -> PluginSpec {
        PluginSpec::factory(|module| {
            Rc::new(ChangeLog {
                module: module.name().to_string(),
            })
        })
    }
}

impl Plugin for ChangeLog {
    fn on_data_change(&self, state: &State, previous: &StateMap) {
        let fields = changed_fields(&state.snapshot(), previous);
        tracing::debug!(module = %self.module, ?fields, "state committed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{define_module, ModuleOptions};
    use crate::state::state_map;
    use modstore_core_store::Value;
    use std::cell::RefCell;

    fn set(key: &'static str, value: i64) -> PluginSpec {
        PluginSpec::instance(PluginHooks::new().on_state_init(move |mut state| {
            state.insert(key.to_string(), Value::from(value));
            state
        }))
    }

    #[test]
    fn init_hooks_fold_in_order() {
        let module = define_module(
            ModuleOptions::new("fold", 1)
                .plugin(set("id", 1))
                .plugin(set("id", 2)),
        )
        .unwrap();

        let state = module.pipeline().init(StateMap::new());
        assert_eq!(state.get("id"), Some(&Value::from(2)));
    }

    #[test]
    fn factories_see_the_owning_module() {
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        define_module(ModuleOptions::new("owner", 3).plugin(PluginSpec::factory(
            move |module| {
                *sink.borrow_mut() = Some((module.name().to_string(), module.version()));
                Rc::new(PluginHooks::new())
            },
        )))
        .unwrap();

        assert_eq!(*seen.borrow(), Some(("owner".to_string(), 3)));
    }

    #[test]
    fn default_hooks_pass_state_through() {
        struct Nothing;
        impl Plugin for Nothing {}

        let pipeline = Pipeline {
            plugins: vec![Rc::new(Nothing)],
        };
        let state = state_map([("a", 1)]);
        assert_eq!(pipeline.init(state.clone()), state);
        pipeline.data_change(&State::new(state.clone()), &state);
    }
}
