//! Turning a module definition into a live handle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use modstore_core_store::Value;
use modstore_reactive::{batch, Derived, Field, Subscription};

use crate::error::{Error, Result};
use crate::module::{Metadata, Module, Mutation};
use crate::state::{State, StateMap};

/// Reserved entry name for a module's metadata.
pub const METADATA: &str = "__metadata";

/// A mutation bound to its module's state.
#[derive(Clone)]
pub struct BoundMutation {
    name: String,
    mutation: Mutation,
}

impl BoundMutation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the mutation as one commit.
    pub fn call(&self, args: &[Value]) {
        batch(|| (self.mutation)(args));
    }
}

impl fmt::Debug for BoundMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMutation")
            .field("name", &self.name)
            .finish()
    }
}

/// One named entry of a flattened module.
#[derive(Debug)]
pub enum Entry<'a> {
    Metadata(&'a Metadata),
    Field(&'a Field<Value>),
    Getter(&'a Derived<Value>),
    Mutation(&'a BoundMutation),
    SubModule(&'a FlattenedModule),
}

/// The live handle of a module.
///
/// Exposes one read-only field per initial state key, one derived value per
/// getter, one bound mutation per mutation and one nested handle per
/// sub-module, all under a single namespace.
pub struct FlattenedModule {
    metadata: Metadata,
    state: State,
    fields: BTreeMap<String, Field<Value>>,
    getters: BTreeMap<String, Derived<Value>>,
    mutations: BTreeMap<String, BoundMutation>,
    sub_modules: BTreeMap<String, FlattenedModule>,
    _subscription: Option<Subscription>,
}

/// Flatten `module`: resolve its initial state through the plugin pipeline,
/// bind getters and mutations to it, subscribe the pipeline to its commits
/// and recurse into sub-modules.
pub fn flatten(module: &Module) -> Result<FlattenedModule> {
    let pipeline = module.pipeline();
    let state = State::new(pipeline.init(module.initial_state()));

    let subscription = if pipeline.is_empty() {
        None
    } else {
        Some(state.watch(move |state, previous| pipeline.data_change(state, previous)))
    };

    let mut sub_modules = BTreeMap::new();
    for (name, sub_module) in module.sub_modules() {
        sub_modules.insert(name.clone(), flatten(sub_module)?);
    }

    assemble(module, state, subscription, sub_modules)
}

/// Bind `module`'s getters and mutations to an already resolved `state` and
/// attach already built sub-module handles.
pub(crate) fn assemble(
    module: &Module,
    state: State,
    subscription: Option<Subscription>,
    sub_modules: BTreeMap<String, FlattenedModule>,
) -> Result<FlattenedModule> {
    let mut names = Names::new(module.name());

    let mut fields = BTreeMap::new();
    for key in state.keys() {
        names.claim(&key)?;
        fields.insert(key.clone(), state.field(key));
    }

    let mut getters = BTreeMap::new();
    for (name, getter) in module.build_getters(&state).into_inner() {
        names.claim(&name)?;
        getters.insert(name, Derived::new(move || getter()));
    }

    let mut mutations = BTreeMap::new();
    for (name, mutation) in module.build_mutations(&state).into_inner() {
        names.claim(&name)?;
        mutations.insert(name.clone(), BoundMutation { name, mutation });
    }

    for name in sub_modules.keys() {
        names.claim(name)?;
    }

    Ok(FlattenedModule {
        metadata: module.metadata(),
        state,
        fields,
        getters,
        mutations,
        sub_modules,
        _subscription: subscription,
    })
}

struct Names<'a> {
    module: &'a str,
    taken: BTreeSet<String>,
}

impl<'a> Names<'a> {
    fn new(module: &'a str) -> Self {
        Self {
            module,
            taken: BTreeSet::from([METADATA.to_string()]),
        }
    }

    fn claim(&mut self, name: &str) -> Result<()> {
        if self.taken.insert(name.to_string()) {
            Ok(())
        } else {
            Err(Error::NameCollision {
                module: self.module.to_string(),
                name: name.to_string(),
            })
        }
    }
}

impl FlattenedModule {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn field(&self, name: &str) -> Option<&Field<Value>> {
        self.fields.get(name)
    }

    pub fn getter(&self, name: &str) -> Option<&Derived<Value>> {
        self.getters.get(name)
    }

    pub fn mutation(&self, name: &str) -> Option<&BoundMutation> {
        self.mutations.get(name)
    }

    pub fn submodule(&self, name: &str) -> Option<&FlattenedModule> {
        self.sub_modules.get(name)
    }

    /// Look up any entry by name.
    pub fn get(&self, name: &str) -> Option<Entry<'_>> {
        if name == METADATA {
            return Some(Entry::Metadata(&self.metadata));
        }
        self.fields
            .get(name)
            .map(Entry::Field)
            .or_else(|| self.getters.get(name).map(Entry::Getter))
            .or_else(|| self.mutations.get(name).map(Entry::Mutation))
            .or_else(|| self.sub_modules.get(name).map(Entry::SubModule))
    }

    /// Current value of a state field or getter.
    pub fn value(&self, name: &str) -> Option<Value> {
        match self.get(name)? {
            Entry::Field(field) => field.get(),
            Entry::Getter(getter) => Some(getter.get()),
            _ => None,
        }
    }

    /// Call a mutation by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<()> {
        let mutation = self
            .mutations
            .get(name)
            .ok_or_else(|| Error::UnknownMutation {
                module: self.metadata.name.clone(),
                name: name.to_string(),
            })?;
        mutation.call(args);
        Ok(())
    }

    /// Every entry name, metadata first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(METADATA)
            .chain(self.fields.keys().map(String::as_str))
            .chain(self.getters.keys().map(String::as_str))
            .chain(self.mutations.keys().map(String::as_str))
            .chain(self.sub_modules.keys().map(String::as_str))
            .collect()
    }

    /// A copy of the whole state, including keys added after flattening.
    pub fn snapshot(&self) -> StateMap {
        self.state.snapshot()
    }
}

impl fmt::Debug for FlattenedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenedModule")
            .field("metadata", &self.metadata)
            .field("state", &self.state)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("sub_modules", &self.sub_modules)
            .finish()
    }
}
