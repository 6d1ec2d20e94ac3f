use std::collections::HashMap;
use std::sync::Arc;

use crate::command::{Command, CommandName, Reply};
use crate::error::StoreResult;

/// A key-value store that executes commands.
///
/// Implementations must satisfy these invariants:
/// - Each `execute` call is a single synchronous round trip.
/// - Errors from the transport are returned, never swallowed or retried.
/// - Values are stored and returned verbatim as strings.
pub trait CommandStore: Send + Sync {
    /// Execute one command and return the raw reply.
    fn execute(&self, command: &Command) -> StoreResult<Reply>;

    /// Read a string key. Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute(&Command::new(CommandName::Get).arg(key))?
            .into_opt_string()
    }

    /// Write a string key, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.execute(&Command::new(CommandName::Set).arg(key).arg(value))?;
        Ok(())
    }

    /// Delete keys. Returns how many existed.
    fn del(&self, keys: &[&str]) -> StoreResult<i64> {
        let args = keys.iter().map(|k| k.to_string()).collect();
        self.execute(&Command::with_args(CommandName::Del, args))?
            .into_int()
    }

    /// Check whether a key exists.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.execute(&Command::new(CommandName::Exists).arg(key))?
            .into_bool()
    }

    /// Set one member of a hash. Returns `true` if the member is new.
    fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.execute(
            &Command::new(CommandName::HSet)
                .arg(key)
                .arg(field)
                .arg(value),
        )?
        .into_bool()
    }

    /// Read one member of a hash.
    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.execute(&Command::new(CommandName::HGet).arg(key).arg(field))?
            .into_opt_string()
    }

    /// Read every member of a hash. A missing key yields an empty map.
    fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.execute(&Command::new(CommandName::HGetAll).arg(key))?
            .into_map()
    }

    /// Delete one member of a hash. Returns `true` if it existed.
    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        self.execute(&Command::new(CommandName::HDel).arg(key).arg(field))?
            .into_bool()
    }
}

impl<S: CommandStore + ?Sized> CommandStore for Arc<S> {
    fn execute(&self, command: &Command) -> StoreResult<Reply> {
        (**self).execute(command)
    }
}

impl<S: CommandStore + ?Sized> CommandStore for &S {
    fn execute(&self, command: &Command) -> StoreResult<Reply> {
        (**self).execute(command)
    }
}
