//! Error types for entity mapping.

use thiserror::Error;

use kvorm_refs::RefError;
use kvorm_store::StoreError;

/// Errors from declaring entity types and from reading or writing fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A value does not fit the field's codec, or a validator rejected it.
    /// Always raised before any store write.
    #[error("invalid value for field {field}: {reason}")]
    Validation { field: String, reason: String },

    /// An entity type or field was declared inconsistently.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A lookup that cannot be satisfied, such as an existence check on a
    /// type without aggregate fields.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The field does not support this operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The entity type declares no field with this name.
    #[error("type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    /// Failure reported by the store, propagated unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A type reference failed to resolve.
    #[error("lookup error: {0}")]
    Ref(#[from] RefError),
}

impl ModelError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for every lookup-class failure: explicit lookups,
    /// unknown fields and unresolved type references.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::Lookup(_) | Self::UnknownField { .. } | Self::Ref(_)
        )
    }
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
