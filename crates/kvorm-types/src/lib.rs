//! Foundation types for kvorm.
//!
//! kvorm projects typed attributes of entities onto a schemaless key-value
//! store. This crate holds the pieces every other kvorm crate agrees on: how
//! an entity is addressed, how store keys are laid out on the wire, and how
//! dates travel as epoch seconds.
//!
//! # Key Types
//!
//! - [`PrimaryKey`] -- string-normalized entity identifier
//! - [`FieldKind`] -- storage backing of a field and its wire tag
//! - [`build_key`] / [`parse_key`] -- the store key codec
//! - [`validate_identifier`] -- naming rules for entity types and fields
//!
//! # Key Layout
//!
//! ```text
//! <prefix>::<kind-tag>::<primary-key>[::<field-name>]
//! ```
//!
//! `<prefix>` defaults to `<namespace>::<lowercased-type-name>`. Aggregate
//! (`hash`) keys omit the field name: every aggregate member of one entity
//! shares a single record.

pub mod error;
pub mod key;
pub mod names;
pub mod primary;
pub mod temporal;

pub use error::{TypeError, TypeResult};
pub use key::{build_key, default_prefix, parse_key, FieldKind, KeyParts, KEY_DELIMITER};
pub use names::validate_identifier;
pub use primary::PrimaryKey;
pub use temporal::{date_from_epoch, date_to_epoch, datetime_from_epoch, datetime_to_epoch};
