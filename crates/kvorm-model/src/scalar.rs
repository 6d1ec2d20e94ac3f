//! Native single-key commands on scalar fields.

use std::fmt;
use std::sync::Arc;

use kvorm_store::{Command, CommandName, CommandStore, Reply};

use crate::binding::FieldBinding;
use crate::codec::Codec;
use crate::error::{ModelError, ModelResult};
use crate::mapper::Mapper;
use crate::value::Value;

/// A helper command available on some scalar fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarHelper {
    SetEx,
    SetNx,
    Append,
    StrLen,
    GetRange,
    SetRange,
    IncrBy,
    DecrBy,
    GetSet,
    Expire,
    Ttl,
}

impl ScalarHelper {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarHelper::SetEx => "setex",
            ScalarHelper::SetNx => "setnx",
            ScalarHelper::Append => "append",
            ScalarHelper::StrLen => "strlen",
            ScalarHelper::GetRange => "getrange",
            ScalarHelper::SetRange => "setrange",
            ScalarHelper::IncrBy => "incr_by",
            ScalarHelper::DecrBy => "decr_by",
            ScalarHelper::GetSet => "getset",
            ScalarHelper::Expire => "expire",
            ScalarHelper::Ttl => "ttl",
        }
    }

    /// Helpers a codec permits.
    pub fn allowed_for(codec: &Codec) -> &'static [ScalarHelper] {
        use ScalarHelper::*;
        match codec {
            Codec::String => &[SetEx, SetNx, Append, StrLen, GetRange, SetRange, Expire, Ttl],
            Codec::Boolean | Codec::Date | Codec::DateTime => &[SetEx, SetNx, Expire, Ttl],
            Codec::Integer => &[SetEx, SetNx, IncrBy, DecrBy, GetSet, Expire, Ttl],
            Codec::Enum { .. } | Codec::Foreign { .. } => &[Expire, Ttl],
        }
    }
}

impl fmt::Display for ScalarHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for the helper commands of one scalar field.
///
/// Obtained from [`Entity::scalar`](crate::Entity::scalar). Each method is
/// one round trip; a helper the field's codec does not permit fails without
/// touching the store.
#[derive(Clone)]
pub struct ScalarOps {
    field: String,
    key: String,
    store: Arc<dyn CommandStore>,
    codec: Codec,
    mapper: Mapper,
}

impl ScalarOps {
    pub(crate) fn new(binding: &FieldBinding, codec: Codec, mapper: Mapper) -> Self {
        Self {
            field: binding.name.clone(),
            key: binding.key.clone(),
            store: Arc::clone(binding.store()),
            codec,
            mapper,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn permit(&self, helper: ScalarHelper) -> ModelResult<()> {
        if ScalarHelper::allowed_for(&self.codec).contains(&helper) {
            return Ok(());
        }
        Err(ModelError::UnsupportedOperation(format!(
            "{helper} is not available on {} field {}",
            self.codec.name(),
            self.field
        )))
    }

    fn run(&self, name: CommandName, args: Vec<String>) -> ModelResult<Reply> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(self.key.clone());
        full.extend(args);
        tracing::trace!(field = %self.field, command = %name, key = %self.key, "dispatch");
        Ok(self.store.execute(&Command::with_args(name, full))?)
    }

    /// Write `value` with a time to live in seconds.
    pub fn setex(&self, seconds: u64, value: impl Into<Value>) -> ModelResult<()> {
        self.permit(ScalarHelper::SetEx)?;
        let raw = self.codec.encode(&self.field, &value.into())?;
        self.run(CommandName::SetEx, vec![seconds.to_string(), raw])?;
        Ok(())
    }

    /// Write `value` only if the field holds nothing. Returns whether it was
    /// written.
    pub fn setnx(&self, value: impl Into<Value>) -> ModelResult<bool> {
        self.permit(ScalarHelper::SetNx)?;
        let raw = self.codec.encode(&self.field, &value.into())?;
        Ok(self.run(CommandName::SetNx, vec![raw])?.into_bool()?)
    }

    /// Write `value` and return the decoded previous value.
    pub fn getset(&self, value: impl Into<Value>) -> ModelResult<Value> {
        self.permit(ScalarHelper::GetSet)?;
        let raw = self.codec.encode(&self.field, &value.into())?;
        let previous = self.run(CommandName::GetSet, vec![raw])?.into_opt_string()?;
        Ok(self.codec.decode(previous.as_deref(), &self.mapper))
    }

    /// Append to the stored string. Returns the new length.
    pub fn append(&self, suffix: &str) -> ModelResult<i64> {
        self.permit(ScalarHelper::Append)?;
        Ok(self.run(CommandName::Append, vec![suffix.to_string()])?.into_int()?)
    }

    pub fn strlen(&self) -> ModelResult<i64> {
        self.permit(ScalarHelper::StrLen)?;
        Ok(self.run(CommandName::StrLen, Vec::new())?.into_int()?)
    }

    /// Substring from `start` to `end`, both inclusive.
    pub fn getrange(&self, start: i64, end: i64) -> ModelResult<String> {
        self.permit(ScalarHelper::GetRange)?;
        let reply = self.run(CommandName::GetRange, vec![start.to_string(), end.to_string()])?;
        Ok(reply.into_opt_string()?.unwrap_or_default())
    }

    /// Overwrite part of the stored string starting at byte `offset`.
    /// Returns the new length.
    pub fn setrange(&self, offset: u64, value: &str) -> ModelResult<i64> {
        self.permit(ScalarHelper::SetRange)?;
        Ok(self
            .run(CommandName::SetRange, vec![offset.to_string(), value.to_string()])?
            .into_int()?)
    }

    /// Add to the stored integer. Returns the new value.
    pub fn incr_by(&self, amount: i64) -> ModelResult<i64> {
        self.permit(ScalarHelper::IncrBy)?;
        Ok(self.run(CommandName::IncrBy, vec![amount.to_string()])?.into_int()?)
    }

    pub fn decr_by(&self, amount: i64) -> ModelResult<i64> {
        self.permit(ScalarHelper::DecrBy)?;
        Ok(self.run(CommandName::DecrBy, vec![amount.to_string()])?.into_int()?)
    }

    pub fn incr(&self) -> ModelResult<i64> {
        self.incr_by(1)
    }

    pub fn decr(&self) -> ModelResult<i64> {
        self.decr_by(1)
    }

    /// Set a time to live. Returns `false` if the key does not exist.
    pub fn expire(&self, seconds: u64) -> ModelResult<bool> {
        self.permit(ScalarHelper::Expire)?;
        Ok(self.run(CommandName::Expire, vec![seconds.to_string()])?.into_bool()?)
    }

    /// Remaining time to live: -1 without expiry, -2 if the key is missing.
    pub fn ttl(&self) -> ModelResult<i64> {
        self.permit(ScalarHelper::Ttl)?;
        Ok(self.run(CommandName::Ttl, Vec::new())?.into_int()?)
    }
}

impl fmt::Debug for ScalarOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarOps")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("codec", &self.codec.name())
            .finish()
    }
}
