use std::fmt;
use std::sync::Arc;

use kvorm_refs::TypeIndex;
use kvorm_store::CommandStore;
use kvorm_types::PrimaryKey;

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::schema::Schema;
use crate::value::Value;

/// The environment entities live in: a linked schema and a store client.
///
/// Cheap to clone. The store is supplied already constructed; the mapper
/// never manages connections.
///
/// Entities are only reachable through [`open`](Mapper::open), which checks
/// the primary key:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use kvorm_model::{EntityType, Mapper, MapperConfig, Schema};
/// use kvorm_store::InMemoryStore;
///
/// let mut builder = Schema::builder(MapperConfig::default());
/// builder.register(EntityType::new("User")).unwrap();
/// let mapper = Mapper::new(builder.link().unwrap(), Arc::new(InMemoryStore::new()));
/// let index = mapper.schema().lookup("User").unwrap();
/// let _ = mapper.entity(index, "");
/// ```
#[derive(Clone)]
pub struct Mapper {
    schema: Arc<Schema>,
    store: Arc<dyn CommandStore>,
}

impl Mapper {
    pub fn new(schema: Arc<Schema>, store: Arc<dyn CommandStore>) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &Arc<dyn CommandStore> {
        &self.store
    }

    /// Address an entity by type name (or dotted path) and primary key.
    ///
    /// Nothing is read from the store. Fails if the type is unknown or the
    /// key is empty.
    pub fn open(&self, type_name: &str, pk: impl Into<PrimaryKey>) -> ModelResult<Entity> {
        let pk = pk.into();
        if pk.as_str().is_empty() {
            return Err(ModelError::validation("pk", "primary key must not be empty"));
        }
        let index = self.schema.lookup(type_name)?;
        Ok(self.entity(index, pk))
    }

    /// Entity of an already resolved type. `pk` must be non-empty.
    pub(crate) fn entity(&self, index: TypeIndex, pk: impl Into<PrimaryKey>) -> Entity {
        Entity::new(self.clone(), index, pk.into())
    }

    /// Open an entity and assign each attribute in order.
    pub fn create<I, K, V>(
        &self,
        type_name: &str,
        pk: impl Into<PrimaryKey>,
        attrs: I,
    ) -> ModelResult<Entity>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = self.open(type_name, pk)?;
        for (name, value) in attrs {
            entity.setattr(name.as_ref(), value)?;
        }
        Ok(entity)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("namespace", &self.schema.config().namespace)
            .field("types", &self.schema.len())
            .finish()
    }
}
