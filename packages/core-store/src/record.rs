//! The Record type: stored data, decoded on demand.

use bytes::Bytes;

use crate::{Codec, Error, Value};

/// What a backend holds for a key.
///
/// Disk-backed stores hand back `Raw` JSON text and leave decoding to the
/// reader, so a corrupt record only surfaces as a decode error once somebody
/// asks for its value. In-memory stores keep whatever they were given.
#[derive(Clone, Debug)]
pub enum Record {
    /// Undecoded JSON text.
    Raw(Bytes),
    Parsed(Value),
}

impl Record {
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Record::Raw(bytes.into())
    }

    pub fn parsed(value: Value) -> Self {
        Record::Parsed(value)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Record::Raw(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Record::Raw(_) => None,
            Record::Parsed(v) => Some(v),
        }
    }

    /// Decode with `codec` if still raw.
    pub fn into_value(self, codec: &dyn Codec) -> Result<Value, Error> {
        match self {
            Record::Raw(bytes) => codec.decode(&bytes),
            Record::Parsed(v) => Ok(v),
        }
    }

    /// Encode with `codec` if parsed; raw text passes through untouched.
    pub fn into_bytes(self, codec: &dyn Codec) -> Result<Bytes, Error> {
        match self {
            Record::Raw(bytes) => Ok(bytes),
            Record::Parsed(v) => codec.encode(&v),
        }
    }
}

impl From<Value> for Record {
    fn from(v: Value) -> Self {
        Record::Parsed(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Treats bytes as one UTF-8 string value.
    struct Text;

    impl Codec for Text {
        fn decode(&self, bytes: &[u8]) -> Result<Value, Error> {
            std::str::from_utf8(bytes)
                .map(Value::from)
                .map_err(Error::decode)
        }

        fn encode(&self, value: &Value) -> Result<Bytes, Error> {
            value
                .as_str()
                .map(|s| Bytes::copy_from_slice(s.as_bytes()))
                .ok_or_else(|| Error::encode("not a string"))
        }
    }

    #[test]
    fn raw_records_decode_lazily() {
        let record = Record::raw(&b"hello"[..]);
        assert!(record.is_raw());
        assert_eq!(record.as_value(), None);
        assert_eq!(record.into_value(&Text).unwrap(), Value::from("hello"));
    }

    #[test]
    fn bad_raw_bytes_fail_on_decode() {
        let record = Record::raw(vec![0xff, 0xfe]);
        assert!(matches!(
            record.into_value(&Text),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn raw_bytes_are_written_verbatim() {
        let record = Record::raw(&b"{\"b\":1}"[..]);
        assert_eq!(&record.into_bytes(&Text).unwrap()[..], b"{\"b\":1}");
    }

    #[test]
    fn parsed_records_need_the_codec_only_to_encode() {
        let record = Record::from(Value::from("x"));
        assert_eq!(record.as_value(), Some(&Value::from("x")));
        assert_eq!(&record.clone().into_bytes(&Text).unwrap()[..], b"x");
        assert_eq!(record.into_value(&Text).unwrap(), Value::from("x"));
    }
}
