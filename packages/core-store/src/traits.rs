//! The store seam: Reader, Writer, Codec.

use bytes::Bytes;

use crate::{Error, Key, Record, Value};

/// Read records by key. Object-safe.
pub trait Reader {
    /// `Ok(None)` when nothing is stored under `from`.
    fn read(&mut self, from: &Key) -> Result<Option<Record>, Error>;
}

/// Write records by key. Object-safe.
pub trait Writer {
    /// Store a record under a key, replacing whatever was there.
    fn write(&mut self, to: &Key, data: Record) -> Result<Key, Error>;
}

/// Combined read/write.
pub trait Store: Reader + Writer {}
impl<T: Reader + Writer> Store for T {}

/// Converts between values and the bytes of `Record::Raw`.
pub trait Codec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, Error>;
    fn encode(&self, value: &Value) -> Result<Bytes, Error>;
}
