//! The type registry and its link pass.

use std::collections::HashMap;
use std::fmt;

use crate::error::{RefError, RefResult};
use crate::path::TypePath;

/// Stable position of a type in a [`TypeRegistry`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(usize);

impl TypeIndex {
    /// The raw position.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIndex({})", self.0)
    }
}

/// A reference from one registered type to another.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TypeRef {
    /// No target. Values pass through as raw primary keys.
    #[default]
    Unbound,
    /// A name awaiting the link pass: a full dotted path or a bare type name.
    Symbolic(String),
    /// A resolved target.
    Linked(TypeIndex),
}

impl TypeRef {
    /// A reference by name, resolved later.
    pub fn symbolic(name: impl Into<String>) -> Self {
        TypeRef::Symbolic(name.into())
    }

    /// Returns `true` if no target was declared.
    pub fn is_unbound(&self) -> bool {
        matches!(self, TypeRef::Unbound)
    }

    /// The linked target, if resolved.
    pub fn linked(&self) -> Option<TypeIndex> {
        match self {
            TypeRef::Linked(index) => Some(*index),
            _ => None,
        }
    }

    /// The target to decode into: `None` for an unbound reference, the index
    /// for a linked one. A symbolic reference that was never linked is an
    /// error naming the path.
    pub fn target(&self) -> RefResult<Option<TypeIndex>> {
        match self {
            TypeRef::Unbound => Ok(None),
            TypeRef::Linked(index) => Ok(Some(*index)),
            TypeRef::Symbolic(path) => Err(RefError::Unresolved { path: path.clone() }),
        }
    }
}

/// Something holding type references that the link pass should resolve.
pub trait Linkable {
    /// Every reference this item holds.
    fn type_refs_mut(&mut self) -> Vec<&mut TypeRef>;
}

/// Ordered registry of types, addressed by [`TypeIndex`].
pub struct TypeRegistry<T> {
    paths: Vec<TypePath>,
    items: Vec<T>,
    by_path: HashMap<String, TypeIndex>,
    by_name: HashMap<String, Vec<TypeIndex>>,
}

impl<T> TypeRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            items: Vec::new(),
            by_path: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a type under `path`. Fails if the path is taken.
    pub fn register(&mut self, path: TypePath, item: T) -> RefResult<TypeIndex> {
        if self.by_path.contains_key(path.as_str()) {
            return Err(RefError::Duplicate {
                path: path.to_string(),
            });
        }
        let index = TypeIndex(self.items.len());
        self.by_path.insert(path.as_str().to_string(), index);
        self.by_name
            .entry(path.type_name().to_string())
            .or_default()
            .push(index);
        tracing::debug!(path = %path, index = index.0, "registered type");
        self.paths.push(path);
        self.items.push(item);
        Ok(index)
    }

    pub fn get(&self, index: TypeIndex) -> Option<&T> {
        self.items.get(index.0)
    }

    pub fn get_mut(&mut self, index: TypeIndex) -> Option<&mut T> {
        self.items.get_mut(index.0)
    }

    pub fn path(&self, index: TypeIndex) -> Option<&TypePath> {
        self.paths.get(index.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeIndex, &TypePath, &T)> {
        self.paths
            .iter()
            .zip(&self.items)
            .enumerate()
            .map(|(i, (path, item))| (TypeIndex(i), path, item))
    }

    /// Resolve a full dotted path or a bare type name.
    pub fn lookup(&self, name: &str) -> RefResult<TypeIndex> {
        lookup_by(&self.by_path, &self.by_name, &self.paths, name)
    }

    /// Resolve a single reference. Unbound and already-linked references are
    /// returned unchanged.
    pub fn resolve(&self, reference: &TypeRef) -> RefResult<TypeRef> {
        match reference {
            TypeRef::Symbolic(name) => self.lookup(name).map(TypeRef::Linked),
            other => Ok(other.clone()),
        }
    }
}

impl<T: Linkable> TypeRegistry<T> {
    /// Link every symbolic reference held by every registered type.
    ///
    /// Returns how many references were resolved. Stops at the first name
    /// that does not resolve.
    pub fn link(&mut self) -> RefResult<usize> {
        let mut resolved = 0;
        let Self {
            paths,
            items,
            by_path,
            by_name,
        } = self;
        let (paths, by_path, by_name) = (&*paths, &*by_path, &*by_name);

        for (owner, item) in paths.iter().zip(items.iter_mut()) {
            for reference in item.type_refs_mut() {
                if let TypeRef::Symbolic(name) = reference {
                    let index = lookup_by(by_path, by_name, paths, name)?;
                    tracing::trace!(owner = %owner, name = %name, target = index.0, "linked reference");
                    *reference = TypeRef::Linked(index);
                    resolved += 1;
                }
            }
        }
        tracing::debug!(types = paths.len(), resolved, "link pass complete");
        Ok(resolved)
    }
}

impl<T> std::ops::Index<TypeIndex> for TypeRegistry<T> {
    type Output = T;

    /// Panics if `index` was not issued by this registry.
    fn index(&self, index: TypeIndex) -> &T {
        &self.items[index.0]
    }
}

impl<T> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.paths).finish()
    }
}

fn lookup_by(
    by_path: &HashMap<String, TypeIndex>,
    by_name: &HashMap<String, Vec<TypeIndex>>,
    paths: &[TypePath],
    name: &str,
) -> RefResult<TypeIndex> {
    if let Some(index) = by_path.get(name) {
        return Ok(*index);
    }
    match by_name.get(name).map(Vec::as_slice) {
        Some([index]) => Ok(*index),
        Some(candidates) if !candidates.is_empty() => Err(RefError::Ambiguous {
            name: name.to_string(),
            candidates: candidates.iter().map(|i| paths[i.0].to_string()).collect(),
        }),
        _ => Err(RefError::Unresolved {
            path: name.to_string(),
        }),
    }
}
