//! Thread-local runtime: dependency collection and commit scheduling.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Something a derived computation can depend on.
pub(crate) trait Source {
    /// Bring the source up to date and return its current version.
    fn version(&self) -> u64;
}

/// A bare version counter, bumped by its owner on every change.
#[derive(Default)]
pub(crate) struct Trigger {
    version: Cell<u64>,
}

impl Trigger {
    pub(crate) fn bump(&self) {
        self.version.set(self.version.get() + 1);
    }
}

impl Source for Trigger {
    fn version(&self) -> u64 {
        self.version.get()
    }
}

/// Something holding change callbacks that a commit must deliver.
pub(crate) trait Notify {
    /// Identity used to keep one pending entry per target.
    fn id(&self) -> usize;
    fn notify(&self);
}

#[derive(Default)]
struct Runtime {
    collectors: RefCell<Vec<Vec<Rc<dyn Source>>>>,
    batch_depth: Cell<usize>,
    pending: RefCell<VecDeque<Box<dyn Notify>>>,
    flushing: Cell<bool>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

/// Record a read of `source` in the innermost running derived computation.
pub(crate) fn track(source: Rc<dyn Source>) {
    RUNTIME.with(|rt| {
        if let Some(top) = rt.collectors.borrow_mut().last_mut() {
            let seen = top
                .iter()
                .any(|s| std::ptr::addr_eq(Rc::as_ptr(s), Rc::as_ptr(&source)));
            if !seen {
                top.push(source);
            }
        }
    });
}

struct Collecting;

impl Collecting {
    fn start() -> Self {
        RUNTIME.with(|rt| rt.collectors.borrow_mut().push(Vec::new()));
        Collecting
    }

    fn finish(self) -> Vec<Rc<dyn Source>> {
        std::mem::forget(self);
        RUNTIME.with(|rt| rt.collectors.borrow_mut().pop().unwrap_or_default())
    }
}

impl Drop for Collecting {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.collectors.borrow_mut().pop());
    }
}

/// Run `f`, returning its result and every source it read.
pub(crate) fn collect<R>(f: impl FnOnce() -> R) -> (R, Vec<Rc<dyn Source>>) {
    let collecting = Collecting::start();
    let result = f();
    (result, collecting.finish())
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = RUNTIME.with(|rt| {
            let depth = rt.batch_depth.get().saturating_sub(1);
            rt.batch_depth.set(depth);
            depth == 0
        });
        if outermost && !std::thread::panicking() {
            flush();
        }
    }
}

/// Run `f` as one commit.
///
/// Writes inside `f` take effect immediately, but change callbacks are held
/// back until the outermost `batch` returns, and each changed map is
/// notified once.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use modstore_reactive::{batch, ReactiveMap};
///
/// let map: ReactiveMap<i64> = ReactiveMap::default();
/// let calls = Rc::new(Cell::new(0));
/// let seen = calls.clone();
/// let _sub = map.watch(move |_, _| seen.set(seen.get() + 1));
///
/// batch(|| {
///     map.set("a", 1);
///     map.set("b", 2);
/// });
/// assert_eq!(calls.get(), 1);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
    let guard = BatchGuard;
    let result = f();
    drop(guard);
    result
}

/// Whether the caller is inside a `batch`.
pub fn in_batch() -> bool {
    RUNTIME.with(|rt| rt.batch_depth.get() > 0)
}

/// Queue `target` for notification, delivering right away when no batch or
/// flush is in progress.
pub(crate) fn schedule(target: Box<dyn Notify>) {
    let flush_now = RUNTIME.with(|rt| {
        let mut pending = rt.pending.borrow_mut();
        if !pending.iter().any(|p| p.id() == target.id()) {
            pending.push_back(target);
        }
        rt.batch_depth.get() == 0 && !rt.flushing.get()
    });
    if flush_now {
        flush();
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.flushing.set(false));
    }
}

fn flush() {
    let already_flushing = RUNTIME.with(|rt| rt.flushing.replace(true));
    if already_flushing {
        return;
    }
    let _guard = FlushGuard;

    loop {
        let next = RUNTIME.with(|rt| rt.pending.borrow_mut().pop_front());
        match next {
            Some(target) => target.notify(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        id: usize,
        hits: Rc<Cell<usize>>,
    }

    impl Notify for Counter {
        fn id(&self) -> usize {
            self.id
        }

        fn notify(&self) {
            self.hits.set(self.hits.get() + 1);
        }
    }

    #[test]
    fn schedule_outside_batch_delivers_immediately() {
        let hits = Rc::new(Cell::new(0));
        schedule(Box::new(Counter {
            id: 1,
            hits: hits.clone(),
        }));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn batch_defers_and_dedupes() {
        let hits = Rc::new(Cell::new(0));
        batch(|| {
            for _ in 0..3 {
                schedule(Box::new(Counter {
                    id: 7,
                    hits: hits.clone(),
                }));
            }
            assert!(in_batch());
            assert_eq!(hits.get(), 0);
        });
        assert_eq!(hits.get(), 1);
        assert!(!in_batch());
    }

    #[test]
    fn nested_batches_flush_once_at_the_outermost() {
        let hits = Rc::new(Cell::new(0));
        batch(|| {
            batch(|| {
                schedule(Box::new(Counter {
                    id: 9,
                    hits: hits.clone(),
                }));
            });
            assert_eq!(hits.get(), 0);
        });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn collect_records_tracked_sources() {
        let trigger: Rc<dyn Source> = Rc::new(Trigger::default());
        let ((), sources) = collect(|| {
            track(trigger.clone());
            track(trigger.clone());
        });
        assert_eq!(sources.len(), 1);

        // No collector: tracking is a no-op.
        track(trigger);
    }
}
