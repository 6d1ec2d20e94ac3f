//! Dotted type paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use kvorm_types::validate_identifier;

use crate::error::{RefError, RefResult};

/// Segment separator in a type path.
pub const PATH_SEPARATOR: char = '.';

/// A validated dotted path naming an entity type, e.g. `app.models.User`.
///
/// Every segment is an identifier. The last segment is the type name; the
/// segments before it (if any) are the module.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypePath(String);

impl TypePath {
    /// Parse and validate a dotted path.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvorm_refs::TypePath;
    ///
    /// let path = TypePath::parse("app.models.User").unwrap();
    /// assert_eq!(path.type_name(), "User");
    /// assert_eq!(path.module(), Some("app.models"));
    /// assert!(TypePath::parse("app..User").is_err());
    /// ```
    pub fn parse(path: &str) -> RefResult<Self> {
        for segment in path.split(PATH_SEPARATOR) {
            validate_identifier(segment).map_err(|e| RefError::InvalidPath {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(Self(path.to_string()))
    }

    /// The full dotted path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment.
    pub fn type_name(&self) -> &str {
        self.0
            .rsplit_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Everything before the last segment, if the path has more than one.
    pub fn module(&self) -> Option<&str> {
        self.0.rsplit_once(PATH_SEPARATOR).map(|(module, _)| module)
    }

    /// Iterate over the segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }
}

impl fmt::Debug for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypePath({})", self.0)
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TypePath {
    type Error = RefError;

    fn try_from(value: String) -> RefResult<Self> {
        Self::parse(&value)
    }
}

impl From<TypePath> for String {
    fn from(path: TypePath) -> Self {
        path.0
    }
}

impl std::str::FromStr for TypePath {
    type Err = RefError;

    fn from_str(s: &str) -> RefResult<Self> {
        Self::parse(s)
    }
}
