//! Error types for the core layer.

use crate::key::EmptyKey;

/// Errors raised by values, codecs and store backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key error: {0}")]
    Key(#[from] EmptyKey),

    /// Stored bytes are not valid JSON, or a value does not fit the type
    /// it was read as.
    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("encode error: {message}")]
    Encode { message: String },

    /// Backend I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub fn decode(message: impl ToString) -> Self {
        Error::Decode {
            message: message.to_string(),
        }
    }

    pub fn encode(message: impl ToString) -> Self {
        Error::Encode {
            message: message.to_string(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other {
            message: message.into(),
        }
    }
}
