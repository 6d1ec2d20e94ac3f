use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an entity within its type.
///
/// Primary keys are always held as strings. Integer and string inputs that
/// print the same produce equal keys, so `PrimaryKey::from(1)` and
/// `PrimaryKey::from("1")` address the same stored entity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(String);

impl PrimaryKey {
    /// Wrap an already-normalized string key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh, time-ordered key (UUID v7, simple hex form).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return its string form.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimaryKey({:?})", self.0)
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PrimaryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PrimaryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrimaryKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for PrimaryKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl From<&PrimaryKey> for PrimaryKey {
    fn from(key: &PrimaryKey) -> Self {
        key.clone()
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PrimaryKey {
                fn from(key: $t) -> Self {
                    Self(key.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);
