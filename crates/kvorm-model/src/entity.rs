//! Entity instances: a primary key plus lazily created field bindings.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kvorm_refs::{TypeIndex, TypePath};
use kvorm_types::{FieldKind, PrimaryKey};

use crate::binding::FieldBinding;
use crate::cache::{Existence, HashCache, HashState};
use crate::codec::Codec;
use crate::collection::{ListProxy, SetProxy, SortedSetProxy};
use crate::error::{ModelError, ModelResult};
use crate::field::FieldDescriptor;
use crate::mapper::Mapper;
use crate::scalar::ScalarOps;
use crate::schema::{EntityType, Schema};
use crate::value::Value;

/// One addressable entity: a registered type and a primary key.
///
/// Field bindings are created on first access and kept for the lifetime of
/// the instance. The aggregate record is cached per instance: two instances
/// with the same key keep independent caches.
///
/// Two entities are equal when they have the same type and the same string
/// primary key.
#[derive(Clone)]
pub struct Entity {
    mapper: Mapper,
    type_index: TypeIndex,
    pk: PrimaryKey,
    bindings: HashMap<String, FieldBinding>,
    hash: HashState,
}

fn lookup<'s>(schema: &'s Schema, index: TypeIndex, name: &str) -> ModelResult<&'s FieldDescriptor> {
    let entity_type = schema.entity_type(index);
    entity_type
        .lookup_field(name)
        .map(|(_, descriptor)| descriptor)
        .ok_or_else(|| ModelError::UnknownField {
            type_name: entity_type.name().to_string(),
            field: name.to_string(),
        })
}

fn bind<'b>(
    bindings: &'b mut HashMap<String, FieldBinding>,
    mapper: &Mapper,
    index: TypeIndex,
    pk: &PrimaryKey,
    name: &str,
    kind: FieldKind,
) -> &'b FieldBinding {
    bindings.entry(name.to_string()).or_insert_with(|| {
        let key = mapper.schema().key(index, kind, pk, name);
        FieldBinding::new(name, kind, key, Arc::clone(mapper.store()))
    })
}

fn collection_target(descriptor: &FieldDescriptor) -> ModelResult<Option<TypeIndex>> {
    match descriptor.codec() {
        Codec::Foreign { target, .. } => Ok(target.target()?),
        _ => Ok(None),
    }
}

impl Entity {
    pub(crate) fn new(mapper: Mapper, type_index: TypeIndex, pk: PrimaryKey) -> Self {
        Self {
            mapper,
            type_index,
            pk,
            bindings: HashMap::new(),
            hash: HashState::default(),
        }
    }

    pub fn pk(&self) -> &PrimaryKey {
        &self.pk
    }

    pub fn type_index(&self) -> TypeIndex {
        self.type_index
    }

    pub fn entity_type(&self) -> &EntityType {
        self.mapper.schema().entity_type(self.type_index)
    }

    pub fn type_name(&self) -> &str {
        self.entity_type().name()
    }

    pub fn type_path(&self) -> Option<&TypePath> {
        self.mapper.schema().type_path(self.type_index)
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.entity_type().field_names()
    }

    pub fn hash_cache(&self) -> &HashCache {
        &self.hash.cache
    }

    /// Last known existence of the aggregate record. Never probes the store.
    pub fn existence(&self) -> Existence {
        self.hash.existence
    }

    /// Store key backing a field.
    pub fn field_key(&self, name: &str) -> ModelResult<String> {
        let descriptor = lookup(self.mapper.schema(), self.type_index, name)?;
        Ok(self
            .mapper
            .schema()
            .key(self.type_index, descriptor.kind(), &self.pk, name))
    }

    /// Read and decode a scalar or aggregate field.
    ///
    /// The first aggregate read loads the whole record in one round trip;
    /// later aggregate reads on this instance are served from the cache.
    /// Collections are read through [`list`](Self::list), [`set`](Self::set)
    /// and [`sorted_set`](Self::sorted_set).
    pub fn getattr(&mut self, name: &str) -> ModelResult<Value> {
        let schema = Arc::clone(self.mapper.schema());
        let descriptor = lookup(&schema, self.type_index, name)?;
        let binding = bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            descriptor.kind(),
        );
        binding.obtain(descriptor, &self.mapper, &mut self.hash)
    }

    /// Encode and write a field, then run its validators in declaration
    /// order.
    ///
    /// An encoding failure leaves the store untouched. `Null` deletes
    /// collection and foreign-reference fields.
    pub fn setattr(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        let schema = Arc::clone(self.mapper.schema());
        let descriptor = lookup(&schema, self.type_index, name)?;
        let binding = bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            descriptor.kind(),
        );
        binding.assign(descriptor, &value, &mut self.hash)?;
        descriptor.run_validators(name, &value)
    }

    /// Delete one field's stored value. For an aggregate member only that
    /// member is removed.
    pub fn delattr(&mut self, name: &str) -> ModelResult<()> {
        let schema = Arc::clone(self.mapper.schema());
        let descriptor = lookup(&schema, self.type_index, name)?;
        let binding = bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            descriptor.kind(),
        );
        binding.remove(&mut self.hash)
    }

    fn collection(&mut self, name: &str, expected: FieldKind) -> ModelResult<(FieldBinding, Option<TypeIndex>)> {
        let schema = Arc::clone(self.mapper.schema());
        let descriptor = lookup(&schema, self.type_index, name)?;
        if descriptor.kind() != expected {
            return Err(ModelError::UnsupportedOperation(format!(
                "field {name} is {:?}, not {expected:?}",
                descriptor.kind()
            )));
        }
        let target = collection_target(descriptor)?;
        let binding = bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            expected,
        );
        Ok((binding.clone(), target))
    }

    /// Proxy for a list field.
    pub fn list(&mut self, name: &str) -> ModelResult<ListProxy> {
        let (binding, target) = self.collection(name, FieldKind::List)?;
        Ok(ListProxy::new(&binding, target, self.mapper.clone()))
    }

    /// Proxy for a set field.
    pub fn set(&mut self, name: &str) -> ModelResult<SetProxy> {
        let (binding, target) = self.collection(name, FieldKind::Set)?;
        Ok(SetProxy::new(&binding, target, self.mapper.clone()))
    }

    /// Proxy for a sorted-set field.
    pub fn sorted_set(&mut self, name: &str) -> ModelResult<SortedSetProxy> {
        let (binding, target) = self.collection(name, FieldKind::SortedSet)?;
        Ok(SortedSetProxy::new(&binding, target, self.mapper.clone()))
    }

    /// Helper commands for a scalar field.
    pub fn scalar(&mut self, name: &str) -> ModelResult<ScalarOps> {
        let schema = Arc::clone(self.mapper.schema());
        let descriptor = lookup(&schema, self.type_index, name)?;
        if descriptor.kind() != FieldKind::Scalar {
            return Err(ModelError::UnsupportedOperation(format!(
                "field {name} is {:?}, not a scalar field",
                descriptor.kind()
            )));
        }
        let binding = bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            FieldKind::Scalar,
        );
        Ok(ScalarOps::new(binding, descriptor.codec().clone(), self.mapper.clone()))
    }

    /// Delete everything stored for this entity.
    ///
    /// The shared aggregate record is deleted once, however many aggregate
    /// fields the type declares; every other field's key is deleted on its
    /// own.
    pub fn remove(&mut self) -> ModelResult<()> {
        let schema = Arc::clone(self.mapper.schema());
        let mut aggregate_deleted = false;
        let mut deleted = 0usize;

        for (name, descriptor) in schema.entity_type(self.type_index).fields() {
            let kind = descriptor.kind();
            if kind.is_aggregate() {
                if aggregate_deleted {
                    continue;
                }
                aggregate_deleted = true;
            }
            bind(&mut self.bindings, &self.mapper, self.type_index, &self.pk, name, kind)
                .delete_key()?;
            deleted += 1;
        }

        self.hash.mark_removed();
        tracing::debug!(type_name = %self.type_name(), pk = %self.pk, keys = deleted, "removed entity");
        Ok(())
    }

    /// Whether the aggregate record exists.
    ///
    /// Answered from the last known state when there is one, otherwise by
    /// probing the store. Fails with a lookup error if the type declares no
    /// aggregate fields.
    pub fn hash_exist(&mut self) -> ModelResult<bool> {
        match self.hash.existence {
            Existence::Present => return Ok(true),
            Existence::Absent => return Ok(false),
            Existence::Unknown => {}
        }
        let schema = Arc::clone(self.mapper.schema());
        let entity_type = schema.entity_type(self.type_index);
        let name = entity_type.first_hash_field().ok_or_else(|| {
            ModelError::Lookup(format!(
                "type {} declares no aggregate fields",
                entity_type.name()
            ))
        })?;
        bind(
            &mut self.bindings,
            &self.mapper,
            self.type_index,
            &self.pk,
            name,
            FieldKind::Hash,
        )
        .force_check_exists(&mut self.hash)
    }

    /// Drop the cached aggregate record and forget its existence.
    pub fn invalidate(&mut self) {
        self.hash.invalidate();
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.pk == other.pk && self.type_path() == other.type_path()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name().hash(state);
        self.pk.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.type_name())
            .field("pk", &self.pk.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::schema::SchemaBuilder;
    use chrono::NaiveDate;
    use kvorm_store::{CommandName, InMemoryStore};
    use std::collections::HashSet;

    // -----------------------------------------------------------------------
    // Aggregate fields
    // -----------------------------------------------------------------------

    #[test]
    fn aggregate_reads_share_one_load() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut writer = mapper.open("UserObject", 1).unwrap();
        writer.setattr("name", "Alice").unwrap();
        writer.setattr("rating", 5).unwrap();
        writer.setattr("paid", true).unwrap();

        let mut reader = mapper.open("UserObject", 1).unwrap();
        store.reset();
        assert_eq!(reader.getattr("rating").unwrap(), Value::Int(5));
        assert_eq!(reader.getattr("name").unwrap(), Value::from("Alice"));
        assert_eq!(reader.getattr("paid").unwrap(), Value::Bool(true));
        assert_eq!(reader.getattr("status").unwrap(), Value::from("REGISTERED"));
        assert_eq!(store.command_names(), vec![CommandName::HGetAll]);
        assert_eq!(reader.existence(), Existence::Present);
    }

    #[test]
    fn writes_update_a_loaded_cache() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        assert_eq!(user.getattr("name").unwrap(), Value::from(""));
        assert_eq!(user.hash_cache(), &HashCache::LoadedEmpty);
        assert_eq!(user.existence(), Existence::Absent);

        user.setattr("name", "Bob").unwrap();
        store.reset();
        assert_eq!(user.getattr("name").unwrap(), Value::from("Bob"));
        assert_eq!(store.count(), 0);
        assert_eq!(user.existence(), Existence::Present);
    }

    #[test]
    fn writes_bypass_an_unloaded_cache() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.setattr("name", "Bob").unwrap();
        assert_eq!(user.hash_cache(), &HashCache::NotLoaded);

        store.reset();
        assert_eq!(user.getattr("name").unwrap(), Value::from("Bob"));
        assert_eq!(store.command_names(), vec![CommandName::HGetAll]);
    }

    #[test]
    fn instances_keep_independent_caches() {
        let mapper = fixtures::mapper();
        let mut a = mapper.open("UserObject", 1).unwrap();
        let mut b = mapper.open("UserObject", 1).unwrap();
        assert_eq!(a.getattr("name").unwrap(), Value::from(""));
        b.setattr("name", "Carol").unwrap();
        assert_eq!(a.getattr("name").unwrap(), Value::from(""));

        a.invalidate();
        assert_eq!(a.hash_cache(), &HashCache::NotLoaded);
        assert_eq!(a.getattr("name").unwrap(), Value::from("Carol"));
    }

    #[test]
    fn delattr_on_aggregate_member() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.setattr("name", "Dan").unwrap();
        user.setattr("rating", 3).unwrap();
        user.getattr("name").unwrap();

        store.reset();
        user.delattr("name").unwrap();
        assert_eq!(store.command_names(), vec![CommandName::HDel]);
        assert_eq!(user.existence(), Existence::Unknown);
        assert_eq!(user.getattr("name").unwrap(), Value::from(""));
        assert!(user.hash_exist().unwrap());
    }

    // -----------------------------------------------------------------------
    // Scalar fields
    // -----------------------------------------------------------------------

    #[test]
    fn scalar_fields_round_trip_every_time() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        let day = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        user.setattr("registered", day).unwrap();
        user.setattr("login", "alice").unwrap();

        store.reset();
        assert_eq!(user.getattr("registered").unwrap(), Value::Date(day));
        assert_eq!(user.getattr("login").unwrap(), Value::from("alice"));
        assert_eq!(user.getattr("login").unwrap(), Value::from("alice"));
        assert_eq!(store.count(), 3);
        assert_eq!(
            store.inner().keys(),
            vec![
                "kvorm::userobject::fld::1::login".to_string(),
                "kvorm::userobject::fld::1::registered".to_string(),
            ]
        );
    }

    #[test]
    fn absent_scalar_decodes_to_fallback() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 7).unwrap();
        assert_eq!(user.getattr("credits").unwrap(), Value::Int(0));
        assert_eq!(user.getattr("registered").unwrap(), Value::Null);
        assert_eq!(user.getattr("site").unwrap(), Value::Null);
    }

    // -----------------------------------------------------------------------
    // Assignment rules
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_value_writes_nothing() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        store.reset();
        let err = user.setattr("rating", "five").unwrap_err();
        assert!(matches!(err, ModelError::Validation { .. }));
        assert!(user.setattr("status", "UNKNOWN").is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn validators_run_after_the_write() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        let err = user.setattr("rating", -1).unwrap_err();
        assert_eq!(err, ModelError::validation("rating", "rating must not be negative"));

        let mut fresh = mapper.open("UserObject", 1).unwrap();
        assert_eq!(fresh.getattr("rating").unwrap(), Value::Int(-1));
    }

    #[test]
    fn collection_assignment() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.list("sites_list").unwrap().rpush(["a"]).unwrap();

        store.reset();
        let err = user.setattr("sites_list", 5).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedOperation(_)));
        assert_eq!(store.count(), 0);

        user.setattr("sites_list", Value::Null).unwrap();
        assert_eq!(store.command_names(), vec![CommandName::Del]);
        assert!(store.inner().is_empty());
    }

    #[test]
    fn collections_are_not_read_directly() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        assert!(matches!(
            user.getattr("sites_set"),
            Err(ModelError::UnsupportedOperation(_))
        ));
        assert!(matches!(user.list("name"), Err(ModelError::UnsupportedOperation(_))));
        assert!(matches!(user.set("sites_list"), Err(ModelError::UnsupportedOperation(_))));
    }

    #[test]
    fn unknown_field() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        let err = user.getattr("nickname").unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownField {
                type_name: "UserObject".into(),
                field: "nickname".into()
            }
        );
        assert!(err.is_lookup());
    }

    // -----------------------------------------------------------------------
    // Foreign references
    // -----------------------------------------------------------------------

    #[test]
    fn foreign_reference_resolves_and_clears() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        let site = mapper.open("SiteObject", "s1").unwrap();
        user.setattr("site", &site).unwrap();
        assert_eq!(user.getattr("site").unwrap(), Value::from(&site));

        user.setattr("site", "s2").unwrap();
        let resolved = user.getattr("site").unwrap().into_entity().unwrap();
        assert_eq!(resolved.type_name(), "SiteObject");
        assert_eq!(resolved.pk().as_str(), "s2");

        store.reset();
        user.setattr("site", Value::Null).unwrap();
        assert_eq!(store.command_names(), vec![CommandName::Del]);
        assert_eq!(user.getattr("site").unwrap(), Value::Null);
    }

    #[test]
    fn aggregate_foreign_reference_with_default() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        let home = user.getattr("home").unwrap().into_entity().unwrap();
        assert_eq!(home.pk().as_str(), "1");

        user.setattr("home", 9).unwrap();
        assert_eq!(user.getattr("home").unwrap().as_entity().unwrap().pk().as_str(), "9");

        store.reset();
        user.setattr("home", Value::Null).unwrap();
        assert_eq!(store.command_names(), vec![CommandName::HDel]);
        assert_eq!(user.getattr("home").unwrap().as_entity().unwrap().pk().as_str(), "1");
    }

    #[test]
    fn unbound_reference_passes_raw_keys() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.setattr("raw_ref", 42).unwrap();
        assert_eq!(user.getattr("raw_ref").unwrap(), Value::from("42"));
    }

    // -----------------------------------------------------------------------
    // Removal and existence
    // -----------------------------------------------------------------------

    #[test]
    fn remove_deletes_aggregate_once() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.setattr("name", "Eve").unwrap();
        user.setattr("login", "eve").unwrap();
        user.set("sites_set").unwrap().sadd(["a"]).unwrap();

        let aggregate = user
            .field_names()
            .iter()
            .filter(|n| user.field_key(n).unwrap().contains("::hash::"))
            .count();
        let others = user.field_names().len() - aggregate;
        assert!(aggregate > 1);

        store.reset();
        user.remove().unwrap();
        let names = store.command_names();
        assert_eq!(names.len(), 1 + others);
        assert!(names.iter().all(|n| *n == CommandName::Del));
        assert!(store.inner().is_empty());

        assert_eq!(user.hash_cache(), &HashCache::LoadedEmpty);
        assert_eq!(user.existence(), Existence::Absent);
        store.reset();
        assert_eq!(user.getattr("name").unwrap(), Value::from(""));
        assert!(!user.hash_exist().unwrap());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn hash_exist_probes_only_when_unknown() {
        let (mapper, store) = fixtures::recording_mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        store.reset();
        assert!(!user.hash_exist().unwrap());
        assert_eq!(store.command_names(), vec![CommandName::Exists]);
        assert_eq!(user.existence(), Existence::Absent);

        user.setattr("paid", false).unwrap();
        store.reset();
        assert!(user.hash_exist().unwrap());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn hash_exist_needs_an_aggregate_field() {
        let mut builder = SchemaBuilder::default();
        builder
            .register(EntityType::new("Counter").field("hits", FieldDescriptor::scalar(Codec::integer())))
            .unwrap();
        let mapper = Mapper::new(builder.link().unwrap(), Arc::new(InMemoryStore::new()));
        let mut counter = mapper.open("Counter", 1).unwrap();
        assert!(matches!(counter.hash_exist(), Err(ModelError::Lookup(_))));
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn equality_uses_type_and_string_key() {
        let mapper = fixtures::mapper();
        let a = mapper.open("UserObject", 1).unwrap();
        let b = mapper.open("app.models.UserObject", "1").unwrap();
        let site = mapper.open("SiteObject", 1).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, site);

        let set: HashSet<Entity> = [a.clone(), b, site].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(format!("{a:?}"), r#"Entity { type: "UserObject", pk: "1" }"#);
    }

    #[test]
    fn bindings_are_created_once_per_field() {
        let mapper = fixtures::mapper();
        let mut user = mapper.open("UserObject", 1).unwrap();
        user.getattr("name").unwrap();
        user.getattr("name").unwrap();
        user.setattr("rating", 1).unwrap();
        user.list("sites_list").unwrap();
        assert_eq!(user.bindings.len(), 3);
        assert_eq!(
            user.bindings["name"].key,
            user.bindings["rating"].key,
        );
    }
}
