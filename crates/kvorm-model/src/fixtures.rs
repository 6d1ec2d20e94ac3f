//! Shared schema for unit tests.

use std::sync::Arc;

use kvorm_refs::TypeRef;
use kvorm_store::{InMemoryStore, RecordingStore};

use crate::codec::Codec;
use crate::config::MapperConfig;
use crate::field::FieldDescriptor;
use crate::mapper::Mapper;
use crate::schema::{EntityType, Schema, SchemaBuilder};

pub(crate) fn user_type() -> EntityType {
    let status = Codec::enumeration(["REGISTERED", "ACTIVE", "BANNED"], "REGISTERED")
        .expect("valid enumeration");
    EntityType::new("UserObject")
        .with_path("app.models.UserObject")
        .field("name", FieldDescriptor::hash(Codec::string()))
        .field(
            "rating",
            FieldDescriptor::hash(Codec::integer()).with_validator(|v| match v.as_int() {
                Some(n) if n < 0 => Err("rating must not be negative".into()),
                _ => Ok(()),
            }),
        )
        .field("paid", FieldDescriptor::hash(Codec::boolean()))
        .field("status", FieldDescriptor::hash(status))
        .field("last_seen", FieldDescriptor::hash(Codec::datetime()))
        .field(
            "home",
            FieldDescriptor::hash(Codec::foreign_with_default(TypeRef::symbolic("SiteObject"), 1)),
        )
        .field("login", FieldDescriptor::scalar(Codec::string()))
        .field("credits", FieldDescriptor::scalar(Codec::integer()))
        .field("registered", FieldDescriptor::scalar(Codec::date()))
        .field(
            "site",
            FieldDescriptor::scalar(Codec::foreign(TypeRef::symbolic("app.models.SiteObject"))),
        )
        .field("raw_ref", FieldDescriptor::scalar(Codec::foreign(TypeRef::Unbound)))
        .field("sites_list", FieldDescriptor::list(TypeRef::symbolic("SiteObject")))
        .field("sites_set", FieldDescriptor::set(TypeRef::symbolic("SiteObject")))
        .field("sites_zset", FieldDescriptor::sorted_set(TypeRef::symbolic("SiteObject")))
        .field("tags", FieldDescriptor::set(TypeRef::Unbound))
}

pub(crate) fn site_type() -> EntityType {
    EntityType::new("SiteObject")
        .with_path("app.models.SiteObject")
        .field("name", FieldDescriptor::hash(Codec::string()))
        .field(
            "owner",
            FieldDescriptor::scalar(Codec::foreign(TypeRef::symbolic("UserObject"))),
        )
}

pub(crate) fn schema() -> Arc<Schema> {
    let mut builder = SchemaBuilder::new(MapperConfig::default());
    builder.register(user_type()).expect("register user");
    builder.register(site_type()).expect("register site");
    builder.link().expect("link fixtures")
}

pub(crate) fn mapper() -> Mapper {
    Mapper::new(schema(), Arc::new(InMemoryStore::new()))
}

/// A mapper whose store logs every command.
pub(crate) fn recording_mapper() -> (Mapper, Arc<RecordingStore<InMemoryStore>>) {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    (Mapper::new(schema(), store.clone()), store)
}
