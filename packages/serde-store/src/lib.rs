//! Serde integration for modstore backends.
//!
//! This layer provides typed access to any `Reader`/`Writer` via serde:
//! - `TypedReader`: Read directly into Rust types
//! - `TypedWriter`: Write Rust types directly
//! - `JsonCodec`: The codec persisted records are written with
//! - Value <-> serde conversions
//!
//! # Example
//!
//! ```rust,ignore
//! use modstore_serde_store::{JsonCodec, TypedReader};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Envelope {
//!     version: u32,
//! }
//!
//! fn read_envelope(store: &mut dyn Reader) -> Result<Option<Envelope>, Error> {
//!     store.read_as(&key!("web-store"), &JsonCodec)
//! }
//! ```

pub use bytes::Bytes;

mod codec;
mod convert;
mod typed;

pub use codec::JsonCodec;
pub use convert::{from_value, to_value};
pub use typed::{TypedReader, TypedWriter};

// Re-export core types for convenience
pub use modstore_core_store::{
    key, Codec, EmptyKey, Error, Key, Reader, Record, Store, Value, ValueKind, Writer,
};
