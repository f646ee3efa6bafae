//! Conversions between Value and serde types.

use modstore_core_store::{Error, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Convert a Value to a Rust type via serde.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    let json = serde_json::to_value(&value).map_err(Error::decode)?;
    serde_json::from_value(json).map_err(Error::decode)
}

/// Convert a Rust type to a Value via serde.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value, Error> {
    let json = serde_json::to_value(data).map_err(Error::encode)?;
    serde_json::from_value(json).map_err(Error::encode)
}
