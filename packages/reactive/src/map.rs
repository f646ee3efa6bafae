//! The mutation-tracking map module state lives in.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::runtime::{self, Notify, Trigger};
use crate::Subscription;

type Callback<V> = Rc<dyn Fn(&ReactiveMap<V>, &BTreeMap<String, V>)>;

/// How many times in a row callbacks may write to the map they are being
/// notified about before the runtime gives up re-notifying.
pub const MAX_REENTRIES: u32 = 100;

/// A shared map of named fields with per-field change tracking.
///
/// Cloning the map clones the handle; all clones see the same entries.
/// Reads made inside a [`Derived`](crate::Derived) computation register a
/// dependency on the field read (or on the whole map for `keys`,
/// `snapshot` and `len`). Writes bump the field's version and schedule one
/// change notification for the current commit.
pub struct ReactiveMap<V> {
    inner: Rc<MapInner<V>>,
}

struct MapInner<V> {
    entries: RefCell<BTreeMap<String, V>>,
    triggers: RefCell<BTreeMap<String, Rc<Trigger>>>,
    shape: Rc<Trigger>,
    committed: RefCell<BTreeMap<String, V>>,
    callbacks: RefCell<Vec<(u64, Callback<V>)>>,
    next_callback: Cell<u64>,
    dirty: Cell<bool>,
    dispatching: Cell<bool>,
    reentries: Cell<u32>,
}

struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        FlagGuard(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<V: Clone + PartialEq + 'static> ReactiveMap<V> {
    pub fn new(entries: BTreeMap<String, V>) -> Self {
        Self {
            inner: Rc::new(MapInner {
                committed: RefCell::new(entries.clone()),
                entries: RefCell::new(entries),
                triggers: RefCell::new(BTreeMap::new()),
                shape: Rc::new(Trigger::default()),
                callbacks: RefCell::new(Vec::new()),
                next_callback: Cell::new(0),
                dirty: Cell::new(false),
                dispatching: Cell::new(false),
                reentries: Cell::new(0),
            }),
        }
    }

    fn trigger(&self, key: &str) -> Rc<Trigger> {
        self.inner
            .triggers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn track_key(&self, key: &str) {
        runtime::track(self.trigger(key));
    }

    fn track_shape(&self) {
        runtime::track(self.inner.shape.clone());
    }

    /// Read a field, registering a dependency on it.
    pub fn get(&self, key: &str) -> Option<V> {
        self.track_key(key);
        self.peek(key)
    }

    /// Read a field without registering a dependency.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.inner.entries.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.track_key(key);
        self.inner.entries.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.track_shape();
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.track_shape();
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, registering a dependency on the whole map.
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.track_shape();
        self.inner.entries.borrow().clone()
    }

    /// Write a field. Returns whether the stored value changed.
    pub fn set(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        let changed = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get(&key) {
                Some(current) if *current == value => false,
                _ => {
                    entries.insert(key.clone(), value);
                    true
                }
            }
        };
        if changed {
            self.changed(&key);
        }
        changed
    }

    /// Edit a field in place. Returns whether the stored value changed;
    /// missing fields are left alone.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut V)) -> bool {
        let Some(mut value) = self.peek(key) else {
            return false;
        };
        f(&mut value);
        self.set(key, value)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.changed(key);
        }
        removed
    }

    /// Write several fields as one commit, keeping fields not mentioned.
    pub fn assign(&self, entries: impl IntoIterator<Item = (String, V)>) {
        runtime::batch(|| {
            for (key, value) in entries {
                self.set(key, value);
            }
        });
    }

    /// Read-only view of one field.
    pub fn field(&self, key: impl Into<String>) -> Field<V> {
        Field {
            map: self.clone(),
            key: key.into(),
        }
    }

    /// Register a change callback.
    ///
    /// The callback runs once per commit that changed the map, receiving the
    /// map and the entries as of the previous commit. Writes a callback makes
    /// to this map start a new commit once every callback has run, so all
    /// callbacks (earlier ones included) see the final entries. Callbacks
    /// that write should converge; after [`MAX_REENTRIES`] rounds the entries
    /// are committed without another notification.
    pub fn watch(
        &self,
        callback: impl Fn(&ReactiveMap<V>, &BTreeMap<String, V>) + 'static,
    ) -> Subscription {
        let id = self.inner.next_callback.get();
        self.inner.next_callback.set(id + 1);
        self.inner
            .callbacks
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.callbacks.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Whether both handles point at the same map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn changed(&self, key: &str) {
        self.trigger(key).bump();
        self.inner.shape.bump();
        self.inner.dirty.set(true);
        if !self.inner.dispatching.get() {
            runtime::schedule(Box::new(self.clone()));
        }
    }
}

impl<V: Clone + PartialEq + 'static> Notify for ReactiveMap<V> {
    fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    fn notify(&self) {
        if !self.inner.dirty.replace(false) {
            return;
        }

        let callbacks: Vec<Callback<V>> = self
            .inner
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        let previous = self.inner.committed.borrow().clone();
        let current = self.inner.entries.borrow().clone();

        {
            let _dispatching = FlagGuard::raise(&self.inner.dispatching);
            for callback in callbacks {
                callback(self, &previous);
            }
        }

        *self.inner.committed.borrow_mut() = current;
        if !self.inner.dirty.get() {
            self.inner.reentries.set(0);
            return;
        }

        let rounds = self.inner.reentries.get() + 1;
        if rounds > MAX_REENTRIES {
            tracing::warn!(
                rounds,
                "change callbacks keep rewriting their own map, committing without notifying"
            );
            *self.inner.committed.borrow_mut() = self.inner.entries.borrow().clone();
            self.inner.dirty.set(false);
            self.inner.reentries.set(0);
        } else {
            self.inner.reentries.set(rounds);
            runtime::schedule(Box::new(self.clone()));
        }
    }
}

impl<V: Clone + PartialEq + 'static> Default for ReactiveMap<V> {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl<V> Clone for ReactiveMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ReactiveMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.entries.borrow().iter()).finish()
    }
}

/// A read-only view of one field of a [`ReactiveMap`].
///
/// Reads see every write made to the underlying map; there is no way to
/// write through a `Field`.
pub struct Field<V> {
    map: ReactiveMap<V>,
    key: String,
}

impl<V: Clone + PartialEq + 'static> Field<V> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, registering a dependency on it. `None` once the field
    /// has been removed from the map.
    pub fn get(&self) -> Option<V> {
        self.map.get(&self.key)
    }
}

impl<V> Clone for Field<V> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
            key: self.key.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Field<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("key", &self.key).finish()
    }
}
