//! Store command interface for kvorm.
//!
//! kvorm never talks to a network client directly. Everything it needs from
//! the key-value store goes through [`CommandStore::execute`]: a named
//! command plus positional string arguments in, a [`Reply`] out. Transport,
//! pooling, authentication and retries belong to whoever implements the
//! trait.
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- `HashMap`-based store with key-value-store
//!   semantics for strings, hashes, lists, sets and sorted sets; used for
//!   tests and embedding
//! - [`RecordingStore`] -- wraps any store and logs every command, so
//!   callers can count round trips
//!
//! # Design Rules
//!
//! 1. One `execute` call is one round trip.
//! 2. Replies are plain strings, integers, lists, maps or scored pairs; the
//!    store never interprets values.
//! 3. Transport errors surface as [`StoreError`] and are never retried here.

pub mod command;
pub mod error;
pub mod memory;
pub mod recording;
pub mod traits;

pub use command::{Command, CommandName, Reply};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use recording::RecordingStore;
pub use traits::CommandStore;
