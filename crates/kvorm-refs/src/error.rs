//! Error types for type registration and linking.

use thiserror::Error;

/// Errors from registering or resolving type references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// No registered type matches the referenced name.
    #[error("unresolved type reference: {path}")]
    Unresolved { path: String },

    /// A bare type name matches more than one registered type.
    #[error("ambiguous type reference {name}: candidates {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    /// A type with this path is already registered.
    #[error("type already registered: {path}")]
    Duplicate { path: String },

    /// The dotted path is malformed.
    #[error("invalid type path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Result alias for reference operations.
pub type RefResult<T> = Result<T, RefError>;
