//! Typed reader and writer extension traits.

use serde::de::DeserializeOwned;
use serde::Serialize;

use modstore_core_store::{Codec, Error, Key, Reader, Record, Writer};

use crate::convert::{from_value, to_value};

/// Extension trait for typed reads.
///
/// This trait is automatically implemented for all `Reader` implementations.
pub trait TypedReader: Reader {
    /// Read a record and deserialize it into a Rust type.
    ///
    /// This method:
    /// 1. Reads the Record from the store
    /// 2. Parses it to a Value using the codec (if raw)
    /// 3. Deserializes the Value to the target type
    ///
    /// A record that fails to parse or does not fit `T` is an `Error::Decode`.
    fn read_as<T: DeserializeOwned>(
        &mut self,
        from: &Key,
        codec: &dyn Codec,
    ) -> Result<Option<T>, Error> {
        let Some(record) = self.read(from)? else {
            return Ok(None);
        };

        let value = record.into_value(codec)?;
        let typed = from_value(value)?;
        Ok(Some(typed))
    }
}

// Blanket implementation for all Readers
impl<R: Reader + ?Sized> TypedReader for R {}

/// Extension trait for typed writes.
///
/// This trait is automatically implemented for all `Writer` implementations.
pub trait TypedWriter: Writer {
    /// Serialize a Rust type and write it to the store as a parsed record.
    fn write_as<T: Serialize>(&mut self, to: &Key, data: &T) -> Result<Key, Error> {
        let value = to_value(data)?;
        self.write(to, Record::parsed(value))
    }
}

// Blanket implementation for all Writers
impl<W: Writer + ?Sized> TypedWriter for W {}
