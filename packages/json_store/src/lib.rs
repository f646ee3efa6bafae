//! Key-value backends that persisted module state is written to.

pub mod in_memory;
pub mod local_disk;

pub use in_memory::InMemoryStore;
pub use local_disk::{JsonLocalStore, LocalStoreError};
