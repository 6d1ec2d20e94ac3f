//! Typed wrappers over [`Entity`].

use kvorm_types::PrimaryKey;

use crate::entity::Entity;
use crate::error::ModelResult;
use crate::mapper::Mapper;
use crate::value::Value;

/// A typed entity.
///
/// Implementors wrap an [`Entity`] and may override [`get`](Model::get),
/// [`set`](Model::set) and [`delete`](Model::delete) to intercept field
/// access. [`create`](Model::create) routes every initial attribute through
/// `set`, so overrides apply to construction as well.
pub trait Model: Sized {
    /// Registered type name or dotted path.
    const TYPE_NAME: &'static str;

    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;

    fn entity_mut(&mut self) -> &mut Entity;

    fn open(mapper: &Mapper, pk: impl Into<PrimaryKey>) -> ModelResult<Self> {
        Ok(Self::from_entity(mapper.open(Self::TYPE_NAME, pk)?))
    }

    fn create<I, K, V>(mapper: &Mapper, pk: impl Into<PrimaryKey>, attrs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut model = Self::open(mapper, pk)?;
        for (name, value) in attrs {
            model.set(name.as_ref(), value.into())?;
        }
        Ok(model)
    }

    fn get(&mut self, field: &str) -> ModelResult<Value> {
        self.entity_mut().getattr(field)
    }

    fn set(&mut self, field: &str, value: Value) -> ModelResult<()> {
        self.entity_mut().setattr(field, value)
    }

    fn delete(&mut self, field: &str) -> ModelResult<()> {
        self.entity_mut().delattr(field)
    }

    fn pk(&self) -> &PrimaryKey {
        self.entity().pk()
    }

    fn remove(&mut self) -> ModelResult<()> {
        self.entity_mut().remove()
    }
}
