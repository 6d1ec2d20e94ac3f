//! Store key layout.
//!
//! Every value kvorm writes lives under a key derived from the owning
//! entity's prefix, the field's storage kind, the primary key and (except for
//! aggregate records) the field name:
//!
//! ```text
//! kvorm::user::fld::12::login
//! kvorm::user::list::12::sites
//! kvorm::user::zset::12::winners
//! kvorm::user::hash::54
//! ```
//!
//! Field names are identifiers, so they never contain the delimiter. That
//! keeps the layout injective even when a primary key does.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::primary::PrimaryKey;

/// Separator between key components.
pub const KEY_DELIMITER: &str = "::";

/// Storage backing of a field.
///
/// The kind decides which store commands a field uses and contributes its
/// tag to the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// One plain string key per field.
    Scalar,
    /// A member of the entity's shared aggregate record.
    Hash,
    /// A store-native ordered list.
    List,
    /// A store-native unordered set.
    Set,
    /// A store-native sorted set.
    SortedSet,
}

impl FieldKind {
    /// All kinds, in tag order.
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Scalar,
        FieldKind::Hash,
        FieldKind::List,
        FieldKind::Set,
        FieldKind::SortedSet,
    ];

    /// The wire tag used in store keys.
    pub const fn tag(self) -> &'static str {
        match self {
            FieldKind::Scalar => "fld",
            FieldKind::Hash => "hash",
            FieldKind::List => "list",
            FieldKind::Set => "set",
            FieldKind::SortedSet => "zset",
        }
    }

    /// Parse a wire tag back into a kind.
    pub fn from_tag(tag: &str) -> TypeResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| TypeError::UnknownKindTag(tag.to_string()))
    }

    /// Returns `true` for aggregate members, which share one key per entity.
    pub const fn is_aggregate(self) -> bool {
        matches!(self, FieldKind::Hash)
    }

    /// Returns `true` for list, set and sorted-set fields.
    pub const fn is_collection(self) -> bool {
        matches!(self, FieldKind::List | FieldKind::Set | FieldKind::SortedSet)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Default key prefix for an entity type: `<namespace>::<lowercased-name>`.
pub fn default_prefix(namespace: &str, type_name: &str) -> String {
    format!("{namespace}{KEY_DELIMITER}{}", type_name.to_lowercase())
}

/// Build the store key for one field of one entity.
///
/// Aggregate kinds ignore `field`: all aggregate members of an entity share
/// the same key.
pub fn build_key(prefix: &str, kind: FieldKind, pk: &PrimaryKey, field: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + pk.as_str().len() + field.len() + 12);
    key.push_str(prefix);
    key.push_str(KEY_DELIMITER);
    key.push_str(kind.tag());
    key.push_str(KEY_DELIMITER);
    key.push_str(pk.as_str());
    if !kind.is_aggregate() {
        key.push_str(KEY_DELIMITER);
        key.push_str(field);
    }
    key
}

/// Components recovered from a store key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyParts {
    pub kind: FieldKind,
    pub pk: PrimaryKey,
    /// `None` for aggregate keys.
    pub field: Option<String>,
}

/// Split a key built by [`build_key`] under `prefix` back into its parts.
///
/// Returns `None` when the key does not belong to `prefix` or is malformed.
pub fn parse_key(key: &str, prefix: &str) -> Option<KeyParts> {
    let rest = key.strip_prefix(prefix)?.strip_prefix(KEY_DELIMITER)?;
    let (tag, rest) = rest.split_once(KEY_DELIMITER)?;
    let kind = FieldKind::from_tag(tag).ok()?;
    if kind.is_aggregate() {
        return Some(KeyParts {
            kind,
            pk: PrimaryKey::from(rest),
            field: None,
        });
    }
    let (pk, field) = rest.rsplit_once(KEY_DELIMITER)?;
    Some(KeyParts {
        kind,
        pk: PrimaryKey::from(pk),
        field: Some(field.to_string()),
    })
}
