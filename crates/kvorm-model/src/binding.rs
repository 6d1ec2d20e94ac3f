//! Field bindings: one field of one entity, bound to its store key.

use std::sync::Arc;

use kvorm_store::{Command, CommandName, CommandStore, Reply};
use kvorm_types::FieldKind;

use crate::cache::{Existence, HashState};
use crate::error::{ModelError, ModelResult};
use crate::field::FieldDescriptor;
use crate::mapper::Mapper;
use crate::value::Value;

/// A field of one entity instance, created on first access and kept for the
/// lifetime of the instance.
///
/// Aggregate bindings hold the shared record key; the record's cache lives on
/// the entity and is passed in by the caller.
#[derive(Clone)]
pub(crate) struct FieldBinding {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) key: String,
    store: Arc<dyn CommandStore>,
}

impl FieldBinding {
    pub(crate) fn new(name: &str, kind: FieldKind, key: String, store: Arc<dyn CommandStore>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            key,
            store,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn CommandStore> {
        &self.store
    }

    fn dispatch(&self, command: Command) -> ModelResult<Reply> {
        tracing::trace!(field = %self.name, command = %command.name, key = %self.key, "dispatch");
        Ok(self.store.execute(&command)?)
    }

    /// Write a value through the field's codec.
    ///
    /// `Null` deletes collection and reference fields. Collections reject
    /// any other value without touching the store.
    pub(crate) fn assign(
        &self,
        descriptor: &FieldDescriptor,
        value: &Value,
        hash: &mut HashState,
    ) -> ModelResult<()> {
        if self.kind.is_collection() {
            if !value.is_null() {
                return Err(ModelError::UnsupportedOperation(format!(
                    "collection field {} cannot be assigned directly",
                    self.name
                )));
            }
            return self.delete_key();
        }
        if value.is_null() && descriptor.codec().is_foreign() {
            return self.remove(hash);
        }

        let raw = descriptor.codec().encode(&self.name, value)?;
        match self.kind {
            FieldKind::Hash => {
                self.dispatch(
                    Command::new(CommandName::HSet)
                        .arg(&self.key)
                        .arg(&self.name)
                        .arg(&raw),
                )?;
                hash.record_write(&self.name, raw);
            }
            _ => {
                self.dispatch(Command::new(CommandName::Set).arg(&self.key).arg(raw))?;
            }
        }
        Ok(())
    }

    /// Read and decode the field. Aggregate reads load the whole record on
    /// first use and are served from the cache afterwards.
    pub(crate) fn obtain(
        &self,
        descriptor: &FieldDescriptor,
        mapper: &Mapper,
        hash: &mut HashState,
    ) -> ModelResult<Value> {
        let raw = match self.kind {
            FieldKind::Scalar => self
                .dispatch(Command::new(CommandName::Get).arg(&self.key))?
                .into_opt_string()?,
            FieldKind::Hash => {
                self.load(hash)?;
                hash.cache.member(&self.name).map(str::to_string)
            }
            _ => {
                return Err(ModelError::UnsupportedOperation(format!(
                    "collection field {} is read through its proxy",
                    self.name
                )))
            }
        };
        Ok(descriptor.codec().decode(raw.as_deref(), mapper))
    }

    /// Fetch the aggregate record unless already cached.
    pub(crate) fn load(&self, hash: &mut HashState) -> ModelResult<()> {
        if hash.cache.is_loaded() {
            return Ok(());
        }
        let record = self
            .dispatch(Command::new(CommandName::HGetAll).arg(&self.key))?
            .into_map()?;
        tracing::debug!(key = %self.key, members = record.len(), "loaded aggregate record");
        hash.fill(record);
        Ok(())
    }

    /// Delete this field's stored value. For an aggregate member only the
    /// member is removed; the record may still hold others.
    pub(crate) fn remove(&self, hash: &mut HashState) -> ModelResult<()> {
        if self.kind.is_aggregate() {
            self.dispatch(
                Command::new(CommandName::HDel)
                    .arg(&self.key)
                    .arg(&self.name),
            )?;
            hash.evict(&self.name);
            Ok(())
        } else {
            self.delete_key()
        }
    }

    /// Delete the whole key this binding addresses.
    pub(crate) fn delete_key(&self) -> ModelResult<()> {
        self.dispatch(Command::new(CommandName::Del).arg(&self.key))?;
        Ok(())
    }

    /// Probe the aggregate record directly, ignoring the cache.
    pub(crate) fn force_check_exists(&self, hash: &mut HashState) -> ModelResult<bool> {
        let exists = self
            .dispatch(Command::new(CommandName::Exists).arg(&self.key))?
            .into_bool()?;
        hash.existence = Existence::from(exists);
        Ok(exists)
    }
}

impl std::fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}
