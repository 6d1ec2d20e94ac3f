//! Naming rules for entity types and fields.
//!
//! Valid identifiers:
//! - Must be non-empty
//! - Must start with an ASCII letter or `_`
//! - Must contain only ASCII letters, digits and `_`
//!
//! These rules keep field names free of the key delimiter, which the key
//! codec relies on.

use crate::error::{TypeError, TypeResult};

/// Validate a type or field identifier.
///
/// # Examples
///
/// ```
/// use kvorm_types::validate_identifier;
///
/// assert!(validate_identifier("sites_list").is_ok());
/// assert!(validate_identifier("_ts").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("bad::name").is_err());
/// ```
pub fn validate_identifier(name: &str) -> TypeResult<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(TypeError::InvalidIdentifier {
            name: name.to_string(),
            reason: "identifier must not be empty".into(),
        });
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(TypeError::InvalidIdentifier {
            name: name.to_string(),
            reason: format!("must start with a letter or '_', found {first:?}"),
        });
    }

    if let Some(bad) = chars.find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_')) {
        return Err(TypeError::InvalidIdentifier {
            name: name.to_string(),
            reason: format!("contains forbidden character: {bad:?}"),
        });
    }

    Ok(())
}
