//! De-duplicating arena for synthesized GraphQL types.
//!
//! Connection, edge, and input object names are derived from entity and
//! relationship names, so two different parts of the model can ask for the
//! same type name. The cache builds each name at most once and rejects a
//! second registration whose shape differs from the first.

use crate::error::ModelError;
use async_graphql::dynamic::Type;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

#[derive(Default)]
pub struct TypeCache {
    types: BTreeMap<String, Type>,
    fingerprints: BTreeMap<String, u64>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with the given shape fingerprint, calling `build`
    /// only if the name is unseen. A repeat registration with the same
    /// fingerprint is a no-op; a different fingerprint under the same name
    /// is a modeling error.
    pub fn get_or_create<F>(&mut self, name: &str, fingerprint: u64, build: F) -> Result<(), ModelError>
    where
        F: FnOnce() -> Type,
    {
        match self.fingerprints.get(name) {
            Some(existing) if *existing == fingerprint => Ok(()),
            Some(_) => Err(ModelError::DuplicateTypeName(name.to_string())),
            None => {
                self.fingerprints.insert(name.to_string(), fingerprint);
                self.types.insert(name.to_string(), build());
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Drain every built type for registration on the schema builder.
    pub fn into_types(self) -> impl Iterator<Item = Type> {
        self.types.into_values()
    }
}

/// Stable fingerprint of a type's shape, from its field names and type refs.
pub fn shape_fingerprint<S: AsRef<str>>(parts: &[S]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.as_ref().hash(&mut hasher);
        0xffu8.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::dynamic::Object;

    #[test]
    fn builds_each_name_once() {
        let mut cache = TypeCache::new();
        let fp = shape_fingerprint(&["id: ID!"]);
        let mut built = 0;
        for _ in 0..3 {
            cache
                .get_or_create("UserTodosConnection", fp, || {
                    built += 1;
                    Type::Object(Object::new("UserTodosConnection"))
                })
                .unwrap();
        }
        assert_eq!(built, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rejects_conflicting_shape_under_same_name() {
        let mut cache = TypeCache::new();
        cache
            .get_or_create("CreateUserInput", shape_fingerprint(&["name: String"]), || {
                Type::Object(Object::new("CreateUserInput"))
            })
            .unwrap();
        let err = cache
            .get_or_create("CreateUserInput", shape_fingerprint(&["name: Int"]), || {
                Type::Object(Object::new("CreateUserInput"))
            })
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateTypeName(name) if name == "CreateUserInput"));
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        assert_ne!(
            shape_fingerprint(&["a", "b"]),
            shape_fingerprint(&["b", "a"])
        );
        assert_ne!(shape_fingerprint(&["ab"]), shape_fingerprint(&["a", "b"]));
    }
}
