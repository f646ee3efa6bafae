//! Record keys.

use std::fmt;

/// The only invalid key: the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("key must not be empty")]
pub struct EmptyKey;

/// The name a record is stored under.
///
/// Any non-empty string is a key. Backends with stricter naming rules (a
/// file system, say) encode keys themselves.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// ```rust
    /// use modstore_core_store::Key;
    ///
    /// assert!(Key::parse("User Settings").is_ok());
    /// assert!(Key::parse("").is_err());
    /// ```
    pub fn parse(s: impl Into<String>) -> Result<Self, EmptyKey> {
        let s = s.into();
        if s.is_empty() {
            return Err(EmptyKey);
        }
        Ok(Key(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Key {
    type Error = EmptyKey;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Key::parse(s)
    }
}

/// Key from a non-empty literal.
///
/// ```rust
/// use modstore_core_store::key;
///
/// assert_eq!(key!("user").as_str(), "user");
/// ```
#[macro_export]
macro_rules! key {
    ($s:expr) => {
        $crate::Key::parse($s).expect("key literal must not be empty")
    };
}
