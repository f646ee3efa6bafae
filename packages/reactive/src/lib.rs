//! Reactive primitives for module state.
//!
//! - [`ReactiveMap`]: a mutation-tracking map of named fields. Reads inside
//!   a derived computation register a dependency on the field read; writes
//!   bump that field's version and schedule a change notification.
//! - [`Field`]: a read-only view of one field of a `ReactiveMap`.
//! - [`Derived`]: a lazily evaluated, memoized computation over fields and
//!   other derived values.
//! - [`Subscription`]: RAII guard for a change callback; dropping it
//!   unsubscribes.
//! - [`batch`]: groups writes into one commit.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc`/`RefCell`) and lives on a
//! thread-local runtime. Derived values validate themselves on read by
//! comparing the versions of the sources they read last time, so nothing is
//! recomputed eagerly. Change callbacks are push-based: each map has at most
//! one pending notification per commit, delivered when the outermost batch
//! ends (or right after a write made outside any batch).
//!
//! # Invariants
//!
//! 1. A field's version changes exactly when its value changes; writing an
//!    equal value is a no-op.
//! 2. Callbacks run in registration order.
//! 3. Writes a callback makes to the map it is being notified about are
//!    delivered again as a new commit, up to [`MAX_REENTRIES`] rounds.
//! 4. `Derived::get()` never returns a stale value.

mod derived;
mod map;
mod runtime;
mod subscription;

pub use derived::Derived;
pub use map::{Field, ReactiveMap, MAX_REENTRIES};
pub use runtime::{batch, in_batch};
pub use subscription::Subscription;
