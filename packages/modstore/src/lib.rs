//! Reactive state modules.
//!
//! A [`Module`] is a named, versioned definition: a default state, getters
//! derived from that state, mutations that write to it, plugins and nested
//! sub-modules. [`flatten`] turns a module into a live [`FlattenedModule`]
//! handle; [`define_store`] combines several modules into a [`Store`] that
//! persists them together.
//!
//! - [`persistence`]: plugin that saves a module through a key-value backend
//!   and migrates stored state across versions.
//! - [`ChangeLog`]: plugin that traces the fields each commit changed.
//!
//! # Example
//!
//! ```rust
//! use modstore::{
//!     define_module, flatten, persistence, share, state_map, InMemoryStore, ModuleOptions,
//!     MutationMap, Value,
//! };
//!
//! let backend = share(InMemoryStore::new());
//! let user = define_module(
//!     ModuleOptions::new("user", 1)
//!         .state_init(|| state_map([("name", "anon")]))
//!         .mutations(|state| {
//!             let state = state.clone();
//!             MutationMap::new().with("rename", move |args| {
//!                 if let Some(name) = args.first() {
//!                     state.set("name", name.clone());
//!                 }
//!             })
//!         })
//!         .plugin(persistence(backend.clone())),
//! )
//! .unwrap();
//!
//! let handle = flatten(&user).unwrap();
//! handle.call("rename", &[Value::from("Ada")]).unwrap();
//! assert_eq!(handle.value("name"), Some(Value::from("Ada")));
//! ```

mod error;
mod flatten;
mod module;
mod persist;
mod plugin;
mod state;
mod store;

pub use error::{Error, Result};
pub use flatten::{flatten, BoundMutation, Entry, FlattenedModule, METADATA};
pub use module::{
    define_module, Getter, GetterMap, Metadata, Module, ModuleOptions, Mutation, MutationMap,
};
pub use persist::{migrate, persistence, share, PersistedPayload, SharedStore};
pub use plugin::{ChangeLog, Pipeline, Plugin, PluginFactory, PluginHooks, PluginSpec};
pub use state::{state_map, State, StateMap};
pub use store::{define_store, Store, StoreEnvelope, StoreOptions};

pub use modstore_core_store::{key, Key, Value, ValueKind};
pub use modstore_json_store::{InMemoryStore, JsonLocalStore};
pub use modstore_reactive::{batch, Derived, Field, Subscription};
