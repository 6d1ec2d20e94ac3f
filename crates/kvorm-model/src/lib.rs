//! Entity mapping for kvorm.
//!
//! Declares entity types whose fields live in a key-value store, and turns
//! field reads and writes into store commands. Aggregate fields of one entity
//! share a single hash record that is loaded once per instance; collection
//! fields are exposed as proxies over the store's native list, set and
//! sorted-set commands, with members resolved back to entities.
//!
//! # Key Types
//!
//! - [`EntityType`] / [`FieldDescriptor`] / [`Codec`] -- type declarations
//! - [`SchemaBuilder`] / [`Schema`] -- registration and the link phase
//! - [`Mapper`] -- a linked schema plus a store client
//! - [`Entity`] -- one addressable entity with lazily bound fields
//! - [`ListProxy`] / [`SetProxy`] / [`SortedSetProxy`] -- collection access
//! - [`ScalarOps`] -- native helper commands on scalar fields
//! - [`Model`] -- typed wrappers with overridable accessors
//!
//! # Design Rules
//!
//! 1. Encoding is validated before any write; decoding never fails.
//! 2. One store command per proxy call; proxies cache nothing.
//! 3. At most one aggregate load per entity instance until invalidated.
//! 4. Every reference target is resolved at link time, not at first use.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kvorm_model::{Codec, EntityType, FieldDescriptor, Mapper, MapperConfig, Schema, Value};
//! use kvorm_store::InMemoryStore;
//!
//! let mut builder = Schema::builder(MapperConfig::default());
//! builder
//!     .register(
//!         EntityType::new("User")
//!             .field("name", FieldDescriptor::hash(Codec::string()))
//!             .field("rating", FieldDescriptor::hash(Codec::integer())),
//!     )
//!     .unwrap();
//! let mapper = Mapper::new(builder.link().unwrap(), Arc::new(InMemoryStore::new()));
//!
//! mapper.create("User", 1, [("name", Value::from("Alice")), ("rating", Value::from(5))]).unwrap();
//! let mut user = mapper.open("User", 1).unwrap();
//! assert_eq!(user.getattr("rating").unwrap(), Value::Int(5));
//! ```

mod binding;
pub mod cache;
pub mod codec;
pub mod collection;
pub mod config;
pub mod entity;
pub mod error;
pub mod field;
pub mod mapper;
pub mod model;
pub mod scalar;
pub mod schema;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use cache::{Existence, HashCache};
pub use codec::Codec;
pub use collection::{InsertPosition, ListProxy, SetProxy, SortedSetProxy};
pub use config::MapperConfig;
pub use entity::Entity;
pub use error::{ModelError, ModelResult};
pub use field::{FieldDescriptor, Validator};
pub use mapper::Mapper;
pub use model::Model;
pub use scalar::{ScalarHelper, ScalarOps};
pub use schema::{EntityType, Schema, SchemaBuilder};
pub use value::Value;

pub use kvorm_refs::{TypeIndex, TypeRef};
pub use kvorm_types::{FieldKind, PrimaryKey};

#[cfg(test)]
mod tests {
    use super::*;
    use kvorm_store::{CommandName, InMemoryStore, RecordingStore};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn user_schema() -> Arc<Schema> {
        let mut builder = Schema::builder(MapperConfig::with_namespace("ns"));
        builder
            .register(
                EntityType::new("User")
                    .field("name", FieldDescriptor::hash(Codec::string()))
                    .field("rating", FieldDescriptor::hash(Codec::integer()))
                    .field("email", FieldDescriptor::scalar(Codec::string()))
                    .field("sites", FieldDescriptor::list(TypeRef::symbolic("Site")))
                    .field("scores", FieldDescriptor::sorted_set(TypeRef::symbolic("Site")))
                    .field("best", FieldDescriptor::scalar(Codec::foreign(TypeRef::symbolic("Site"))))
                    .field(
                        "main",
                        FieldDescriptor::scalar(Codec::foreign_with_default(
                            TypeRef::symbolic("Site"),
                            "home",
                        )),
                    ),
            )
            .unwrap();
        builder
            .register(EntityType::new("Site").field("title", FieldDescriptor::hash(Codec::string())))
            .unwrap();
        builder.link().unwrap()
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    }

    fn setup() -> (Mapper, Arc<RecordingStore<InMemoryStore>>) {
        init_tracing();
        let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
        (Mapper::new(user_schema(), store.clone()), store)
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn aggregate_scenario() {
        let (mapper, store) = setup();
        mapper
            .create("User", 1, [("name", Value::from("Alice")), ("rating", Value::from(5))])
            .unwrap();

        let mut user = mapper.open("User", 1).unwrap();
        store.reset();
        assert_eq!(user.getattr("rating").unwrap(), Value::Int(5));
        assert_eq!(user.getattr("name").unwrap(), Value::from("Alice"));
        assert_eq!(store.command_names(), vec![CommandName::HGetAll]);
        assert_eq!(store.commands()[0].key(), Some("ns::user::hash::1"));
    }

    #[test]
    fn list_scenario() {
        let (mapper, _) = setup();
        let mut user = mapper.open("User", 1).unwrap();
        let sites = user.list("sites").unwrap();
        assert_eq!(sites.key(), "ns::user::list::1::sites");

        let a = mapper.open("Site", "a").unwrap();
        let b = mapper.open("Site", "b").unwrap();
        let c = mapper.open("Site", "c").unwrap();
        sites.lpush([&a]).unwrap();
        sites.lpush([&b, &c]).unwrap();

        let members = sites.lrange(0, -1).unwrap();
        assert_eq!(members, vec![Value::from(&c), Value::from(&b), Value::from(&a)]);
        assert!(members
            .iter()
            .all(|m| m.as_entity().is_some_and(|e| e.type_name() == "Site")));
    }

    #[test]
    fn sorted_set_scenario() {
        let (mapper, _) = setup();
        let mut user = mapper.open("User", 1).unwrap();
        let scores = user.sorted_set("scores").unwrap();
        let x = mapper.open("Site", "x").unwrap();
        let y = mapper.open("Site", "y").unwrap();

        scores.zadd([(100.0, &x), (300.0, &y), (200.0, &x)]).unwrap();
        assert_eq!(scores.zcard().unwrap(), 2);
        assert_eq!(scores.zscore(&x).unwrap(), Some(200.0));
        assert_eq!(scores.zrangebyscore(201.0..=300.0).unwrap(), vec![Value::from(&y)]);
    }

    #[test]
    fn foreign_reference_scenario() {
        let (mapper, _) = setup();
        let mut user = mapper.open("User", 1).unwrap();
        assert_eq!(user.getattr("best").unwrap(), Value::Null);

        let main = user.getattr("main").unwrap().into_entity().unwrap();
        assert_eq!(main, mapper.open("Site", "home").unwrap());
    }

    #[test]
    fn remove_scenario() {
        let (mapper, store) = setup();
        let mut user = mapper
            .create(
                "User",
                1,
                [
                    ("name", Value::from("Alice")),
                    ("rating", Value::from(5)),
                    ("email", Value::from("a@example.com")),
                ],
            )
            .unwrap();
        user.list("sites").unwrap().rpush(["s"]).unwrap();

        let non_aggregate = user
            .entity_type()
            .fields()
            .filter(|(_, d)| d.kind() != FieldKind::Hash)
            .count();
        store.reset();
        user.remove().unwrap();
        assert_eq!(store.count(), 1 + non_aggregate);
        assert!(store.inner().is_empty());
    }

    #[test]
    fn collection_assignment_scenario() {
        let (mapper, store) = setup();
        let mut user = mapper.open("User", 1).unwrap();
        user.list("sites").unwrap().rpush(["s"]).unwrap();

        store.reset();
        assert!(matches!(
            user.setattr("sites", "s"),
            Err(ModelError::UnsupportedOperation(_))
        ));
        assert_eq!(store.count(), 0);
        user.setattr("sites", Value::Null).unwrap();
        assert!(store.inner().is_empty());
    }

    // -----------------------------------------------------------------------
    // Identity law
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn equality_follows_string_key(n in any::<u32>(), m in any::<u32>()) {
            let mapper = Mapper::new(user_schema(), Arc::new(InMemoryStore::new()));
            let from_int = mapper.open("User", n).unwrap();
            let from_str = mapper.open("User", n.to_string()).unwrap();
            prop_assert_eq!(&from_int, &from_str);

            let other = mapper.open("User", m).unwrap();
            prop_assert_eq!(from_int == other, n == m);
            let site = mapper.open("Site", n).unwrap();
            prop_assert_ne!(from_int, site);
        }
    }
}
