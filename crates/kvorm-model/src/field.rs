use std::fmt;
use std::sync::Arc;

use kvorm_refs::TypeRef;
use kvorm_types::FieldKind;

use crate::codec::Codec;
use crate::error::{ModelError, ModelResult};
use crate::value::Value;

/// A user check run after a successful assignment.
///
/// Returning `Err(reason)` fails the assignment with a validation error.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Declaration of one field: its storage kind, codec and validators.
///
/// Shared by every entity of the declaring type.
#[derive(Clone)]
pub struct FieldDescriptor {
    kind: FieldKind,
    codec: Codec,
    validators: Vec<Validator>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind, codec: Codec) -> Self {
        Self {
            kind,
            codec,
            validators: Vec::new(),
        }
    }

    /// A field stored under its own string key.
    pub fn scalar(codec: Codec) -> Self {
        Self::new(FieldKind::Scalar, codec)
    }

    /// A member of the entity's shared aggregate record.
    pub fn hash(codec: Codec) -> Self {
        Self::new(FieldKind::Hash, codec)
    }

    /// A list whose members resolve to `target` entities.
    pub fn list(target: TypeRef) -> Self {
        Self::new(FieldKind::List, Codec::foreign(target))
    }

    /// A set whose members resolve to `target` entities.
    pub fn set(target: TypeRef) -> Self {
        Self::new(FieldKind::Set, Codec::foreign(target))
    }

    /// A sorted set whose members resolve to `target` entities.
    pub fn sorted_set(target: TypeRef) -> Self {
        Self::new(FieldKind::SortedSet, Codec::foreign(target))
    }

    /// Append a validator. Validators run in the order they were added.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub(crate) fn codec_mut(&mut self) -> &mut Codec {
        &mut self.codec
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Run every validator on `value`, stopping at the first failure.
    pub(crate) fn run_validators(&self, field: &str, value: &Value) -> ModelResult<()> {
        for validator in &self.validators {
            validator(value).map_err(|reason| ModelError::validation(field, reason))?;
        }
        Ok(())
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("kind", &self.kind)
            .field("codec", &self.codec)
            .field("validators", &self.validators.len())
            .finish()
    }
}
