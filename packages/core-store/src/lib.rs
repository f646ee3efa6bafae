//! Core modstore: values, keys and the key-value store seam.
//!
//! This layer is what the state engine persists through:
//! - `Value`: dynamically typed tree with runtime type tags (`ValueKind`)
//! - `Key`: non-empty name under which a record is stored
//! - `Record`: either raw JSON bytes or a parsed Value
//!
//! Backends implement `Reader` and `Writer`; everything above this layer
//! talks to them through `dyn Store`. Nothing here is thread-safe: a backend
//! is shared by the modules of one thread as `Rc<RefCell<dyn Store>>`.
//!
//! # Example
//!
//! ```rust
//! use modstore_core_store::{key, Error, Reader, Record};
//!
//! fn read_user(store: &mut dyn Reader) -> Result<Option<Record>, Error> {
//!     store.read(&key!("user"))
//! }
//! ```

pub use bytes::Bytes;

mod error;
mod key;
mod record;
mod traits;
mod value;

pub use error::Error;
pub use key::{EmptyKey, Key};
pub use record::Record;
pub use traits::{Codec, Reader, Store, Writer};
pub use value::{Value, ValueKind};
