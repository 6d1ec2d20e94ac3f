//! Entity type declarations and the schema they link into.
//!
//! Types are declared with [`EntityType`], registered on a
//! [`SchemaBuilder`], and linked once into an immutable [`Schema`]. Linking
//! resolves every symbolic reference target and fixes each type's key prefix.

use std::collections::HashSet;
use std::sync::Arc;

use kvorm_refs::{Linkable, TypeIndex, TypePath, TypeRef, TypeRegistry};
use kvorm_types::{build_key, default_prefix, validate_identifier, FieldKind, PrimaryKey, KEY_DELIMITER};

use crate::config::MapperConfig;
use crate::error::{ModelError, ModelResult};
use crate::field::FieldDescriptor;

/// Declaration of an entity type: its name and fields in declaration order.
#[derive(Clone, Debug)]
pub struct EntityType {
    name: String,
    path: Option<String>,
    prefix: Option<String>,
    fields: Vec<(String, FieldDescriptor)>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            prefix: None,
            fields: Vec::new(),
        }
    }

    /// Register under a dotted path (`app.models.User`) instead of the bare
    /// name. The last segment must be the type name.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Override the key prefix, which otherwise defaults to
    /// `<namespace>::<lowercased-name>`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push((name.into(), descriptor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Position and descriptor of a field.
    pub fn lookup_field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .position(|(n, _)| n == name)
            .map(|pos| (pos, &self.fields[pos].1))
    }

    /// The first aggregate-member field, if any.
    pub fn first_hash_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, d)| d.kind().is_aggregate())
            .map(|(name, _)| name.as_str())
    }

    fn check(&self) -> ModelResult<TypePath> {
        let config_error = |e: &dyn std::fmt::Display| ModelError::Configuration(e.to_string());

        validate_identifier(&self.name).map_err(|e| config_error(&e))?;
        let path = TypePath::parse(self.path.as_deref().unwrap_or(&self.name))
            .map_err(|e| config_error(&e))?;
        if path.type_name() != self.name {
            return Err(ModelError::Configuration(format!(
                "path {path} does not end in type name {}",
                self.name
            )));
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() || prefix.starts_with(KEY_DELIMITER) || prefix.ends_with(KEY_DELIMITER) {
                return Err(ModelError::Configuration(format!(
                    "invalid key prefix {prefix:?} for type {}",
                    self.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for (name, _) in &self.fields {
            validate_identifier(name).map_err(|e| config_error(&e))?;
            if !seen.insert(name.as_str()) {
                return Err(ModelError::Configuration(format!(
                    "field {name} declared twice on type {}",
                    self.name
                )));
            }
        }
        Ok(path)
    }
}

impl Linkable for EntityType {
    fn type_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        self.fields
            .iter_mut()
            .filter_map(|(_, d)| d.codec_mut().type_ref_mut())
            .collect()
    }
}

/// Collects entity types before linking.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    config: MapperConfig,
    types: TypeRegistry<EntityType>,
}

impl SchemaBuilder {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            types: TypeRegistry::new(),
        }
    }

    /// Validate and register a type. Names and fields are checked here;
    /// reference targets are checked by [`link`](Self::link).
    pub fn register(&mut self, entity_type: EntityType) -> ModelResult<TypeIndex> {
        let path = entity_type.check()?;
        if self.types.iter().any(|(_, _, t)| t.name == entity_type.name) {
            return Err(ModelError::Configuration(format!(
                "type {} registered twice",
                entity_type.name
            )));
        }
        self.types
            .register(path, entity_type)
            .map_err(|e| ModelError::Configuration(e.to_string()))
    }

    /// Resolve every reference and freeze the schema.
    pub fn link(mut self) -> ModelResult<Arc<Schema>> {
        self.config.validate()?;
        let resolved = self.types.link()?;

        let mut prefixes: Vec<String> = Vec::with_capacity(self.types.len());
        for (_, path, entity_type) in self.types.iter() {
            let prefix = entity_type
                .prefix
                .clone()
                .unwrap_or_else(|| default_prefix(&self.config.namespace, &entity_type.name));
            if let Some(clash) = prefixes.iter().find(|p| prefixes_overlap(p, &prefix)) {
                return Err(ModelError::Configuration(format!(
                    "key prefix {prefix:?} of {path} overlaps {clash:?}"
                )));
            }
            prefixes.push(prefix);
        }

        tracing::debug!(types = self.types.len(), references = resolved, "linked schema");
        Ok(Arc::new(Schema {
            config: self.config,
            types: self.types,
            prefixes,
        }))
    }
}

/// Two prefixes overlap if keys under one could be read as keys under the
/// other.
fn prefixes_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(KEY_DELIMITER))
    };
    nested(a, b) || nested(b, a)
}

/// A linked, immutable set of entity types.
#[derive(Debug)]
pub struct Schema {
    config: MapperConfig,
    types: TypeRegistry<EntityType>,
    prefixes: Vec<String>,
}

impl Schema {
    pub fn builder(config: MapperConfig) -> SchemaBuilder {
        SchemaBuilder::new(config)
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Find a type by bare name or dotted path.
    pub fn lookup(&self, name: &str) -> ModelResult<TypeIndex> {
        Ok(self.types.lookup(name)?)
    }

    /// Panics if `index` was not issued by this schema.
    pub fn entity_type(&self, index: TypeIndex) -> &EntityType {
        &self.types[index]
    }

    pub fn type_path(&self, index: TypeIndex) -> Option<&TypePath> {
        self.types.path(index)
    }

    /// The key prefix of a type.
    pub fn prefix(&self, index: TypeIndex) -> &str {
        &self.prefixes[index.index()]
    }

    /// Store key of one field of one entity.
    pub fn key(&self, index: TypeIndex, kind: FieldKind, pk: &PrimaryKey, field: &str) -> String {
        build_key(self.prefix(index), kind, pk, field)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = (TypeIndex, &EntityType)> {
        self.types.iter().map(|(index, _, t)| (index, t))
    }
}
