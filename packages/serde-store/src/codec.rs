//! JSON codec implementation.

use bytes::Bytes;
use modstore_core_store::{Codec, Error, Value};

/// The codec every persisted record is written with.
///
/// Maps are `BTreeMap`s, so keys come out sorted and encoding the same value
/// twice yields identical bytes. Non-finite floats have no JSON form and are
/// written as `null`.
///
/// # Example
///
/// ```rust
/// use modstore_serde_store::JsonCodec;
/// use modstore_core_store::{Codec, Value};
///
/// let bytes = JsonCodec.encode(&Value::from("hello")).unwrap();
/// assert_eq!(JsonCodec.decode(&bytes).unwrap(), Value::from("hello"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
        serde_json::from_slice(bytes).map_err(Error::decode)
    }

    fn encode(&self, value: &Value) -> Result<Bytes, Error> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(Error::encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted() {
        let value = Value::Map(
            [
                ("state".to_string(), Value::map()),
                ("__version".to_string(), Value::Integer(1)),
            ]
            .into_iter()
            .collect(),
        );

        let bytes = JsonCodec.encode(&value).unwrap();
        assert_eq!(&bytes[..], br#"{"__version":1,"state":{}}"#);
    }

    #[test]
    fn rejects_garbage() {
        let result = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn numbers_keep_their_shape() {
        let value = JsonCodec.decode(br#"{"a":1,"b":1.0,"c":2.5}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Integer(1)));
        assert_eq!(value.get("b"), Some(&Value::Float(1.0)));
        assert_eq!(value.get("c"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn nan_is_written_as_null() {
        let bytes = JsonCodec.encode(&Value::Float(f64::NAN)).unwrap();
        assert_eq!(&bytes[..], b"null");
    }
}
