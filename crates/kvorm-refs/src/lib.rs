//! Cross-type references for kvorm.
//!
//! Entity types may refer to each other (a foreign-reference field on `User`
//! naming `Site`, and `Site` naming `User` back). References are declared by
//! name while types are being registered and resolved in a separate link
//! phase that runs once, after every type is known. Nothing is resolved
//! lazily at first use, so a dangling name fails loudly at link time.
//!
//! # Key Types
//!
//! - [`TypePath`] -- validated dotted path such as `app.models.User`
//! - [`TypeIndex`] -- stable index of a registered type in its registry
//! - [`TypeRef`] -- a reference that is unbound, symbolic, or linked
//! - [`TypeRegistry`] -- ordered registry of types with name lookup and the
//!   link pass
//!
//! # Design Rules
//!
//! 1. Registered types are addressed by index, never by owning pointers, so
//!    mutually referencing types form no ownership cycle.
//! 2. A symbolic name matches a full path exactly, or a bare type name when
//!    exactly one registered type carries it.
//! 3. Linking is all-or-nothing per registry: the first unresolved name
//!    aborts it.

pub mod error;
pub mod path;
pub mod registry;

pub use error::{RefError, RefResult};
pub use path::TypePath;
pub use registry::{Linkable, TypeIndex, TypeRef, TypeRegistry};
