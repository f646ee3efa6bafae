//! Lazily evaluated, memoized computations.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::runtime::{self, Source};

/// A cached value computed from fields and other derived values.
///
/// The computation runs on first `get()` and again only when one of the
/// sources it read during its last run has changed. Sources are discovered
/// automatically: any `ReactiveMap`/`Field` read or nested `Derived::get()`
/// inside the closure counts.
///
/// A derived value that (directly or indirectly) reads itself panics.
///
/// ```rust
/// use modstore_reactive::{Derived, ReactiveMap};
///
/// let state: ReactiveMap<i64> = ReactiveMap::default();
/// state.set("count", 2);
///
/// let reader = state.clone();
/// let doubled = Derived::new(move || reader.get("count").unwrap_or(0) * 2);
/// assert_eq!(doubled.get(), 4);
///
/// state.set("count", 5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

struct DerivedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cache: RefCell<Option<T>>,
    deps: RefCell<Vec<(Rc<dyn Source>, u64)>>,
    version: Cell<u64>,
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(DerivedInner {
                compute: Box::new(compute),
                cache: RefCell::new(None),
                deps: RefCell::new(Vec::new()),
                version: Cell::new(0),
            }),
        }
    }

    /// Current value, recomputing first if any dependency changed.
    pub fn get(&self) -> T {
        runtime::track(self.inner.clone());
        self.inner.value()
    }

    /// Whether the next `get()` will rerun the computation.
    pub fn is_stale(&self) -> bool {
        self.inner.is_stale()
    }
}

impl<T: Clone + PartialEq + 'static> DerivedInner<T> {
    fn is_stale(&self) -> bool {
        if self.cache.borrow().is_none() {
            return true;
        }
        self.deps
            .borrow()
            .iter()
            .any(|(source, seen)| source.version() != *seen)
    }

    fn ensure_fresh(&self) {
        if !self.is_stale() {
            return;
        }

        let (value, sources) = runtime::collect(|| (self.compute)());
        let deps = sources
            .into_iter()
            .map(|source| {
                let seen = source.version();
                (source, seen)
            })
            .collect();
        *self.deps.borrow_mut() = deps;

        let mut cache = self.cache.borrow_mut();
        if cache.as_ref() != Some(&value) {
            self.version.set(self.version.get() + 1);
        }
        *cache = Some(value);
    }

    fn value(&self) -> T {
        self.ensure_fresh();
        let cached = self.cache.borrow().clone();
        cached.unwrap_or_else(|| (self.compute)())
    }
}

impl<T: Clone + PartialEq + 'static> Source for DerivedInner<T> {
    fn version(&self) -> u64 {
        self.ensure_fresh();
        self.version.get()
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("cached", &self.inner.cache.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactiveMap;

    fn counted<T: Clone + PartialEq + 'static>(
        f: impl Fn() -> T + 'static,
    ) -> (Derived<T>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let derived = Derived::new(move || {
            counter.set(counter.get() + 1);
            f()
        });
        (derived, runs)
    }

    #[test]
    fn computes_lazily_and_caches() {
        let state: ReactiveMap<i64> = ReactiveMap::default();
        state.set("a", 1);

        let reader = state.clone();
        let (derived, runs) = counted(move || reader.get("a").unwrap_or(0) + 1);

        assert_eq!(runs.get(), 0);
        assert_eq!(derived.get(), 2);
        assert_eq!(derived.get(), 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn recomputes_only_for_fields_it_read() {
        let state: ReactiveMap<i64> = ReactiveMap::default();
        state.set("a", 1);
        state.set("b", 1);

        let reader = state.clone();
        let (derived, runs) = counted(move || reader.get("a").unwrap_or(0));
        derived.get();

        state.set("b", 2);
        assert!(!derived.is_stale());
        derived.get();
        assert_eq!(runs.get(), 1);

        state.set("a", 3);
        assert!(derived.is_stale());
        assert_eq!(derived.get(), 3);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn chained_derived_values_stay_fresh() {
        let state: ReactiveMap<i64> = ReactiveMap::default();
        state.set("n", 2);

        let reader = state.clone();
        let squared = Derived::new(move || {
            let n = reader.get("n").unwrap_or(0);
            n * n
        });
        let inner = squared.clone();
        let (plus_one, runs) = counted(move || inner.get() + 1);

        assert_eq!(plus_one.get(), 5);
        state.set("n", 3);
        assert_eq!(plus_one.get(), 10);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unchanged_intermediate_value_stops_propagation() {
        let state: ReactiveMap<i64> = ReactiveMap::default();
        state.set("n", 2);

        let reader = state.clone();
        let is_even = Derived::new(move || reader.get("n").unwrap_or(0) % 2 == 0);
        let inner = is_even.clone();
        let (label, runs) = counted(move || if inner.get() { "even" } else { "odd" });

        assert_eq!(label.get(), "even");
        state.set("n", 4);
        assert_eq!(label.get(), "even");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn missing_field_read_is_tracked() {
        let state: ReactiveMap<String> = ReactiveMap::default();
        let reader = state.clone();
        let name = Derived::new(move || reader.get("name").unwrap_or_default());

        assert_eq!(name.get(), "");
        state.set("name", "Ada".to_string());
        assert_eq!(name.get(), "Ada");
    }
}
