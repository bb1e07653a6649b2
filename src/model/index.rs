//! Cross-reference indices over the relationship graph: which relationships
//! point at an entity and which it declares. Built once per schema build and
//! read-only afterwards; every CRUD operation consumes them to synthesize
//! "new edge" output fields.

use crate::model::{ModelRegistry, RelationshipKind};
use std::collections::BTreeMap;

/// One direction of one declared relationship.
#[derive(Clone, Debug)]
pub struct AssocEdge {
    /// Entity that declares the relationship.
    pub from: String,
    /// Target entity.
    pub to: String,
    /// Relationship name as declared.
    pub key: String,
    pub kind: RelationshipKind,
    pub foreign_key: String,
}

impl AssocEdge {
    pub fn is_to_one(&self) -> bool {
        self.kind == RelationshipKind::ToOne
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssocIndex {
    to_entity: BTreeMap<String, Vec<AssocEdge>>,
    from_entity: BTreeMap<String, Vec<AssocEdge>>,
}

impl AssocIndex {
    pub fn build(registry: &ModelRegistry) -> Self {
        let mut index = AssocIndex::default();
        for entity in registry.entities() {
            for (key, rel) in &entity.relationships {
                let edge = AssocEdge {
                    from: entity.name.clone(),
                    to: rel.target.clone(),
                    key: key.clone(),
                    kind: rel.kind.clone(),
                    foreign_key: rel.foreign_key.clone(),
                };
                index
                    .to_entity
                    .entry(rel.target.clone())
                    .or_default()
                    .push(edge.clone());
                index
                    .from_entity
                    .entry(entity.name.clone())
                    .or_default()
                    .push(edge);
            }
        }
        index
    }

    /// Relationships pointing AT `entity` (it is the target).
    pub fn pointing_at(&self, entity: &str) -> &[AssocEdge] {
        self.to_entity.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Relationships declared BY `entity`.
    pub fn declared_by(&self, entity: &str) -> &[AssocEdge] {
        self.from_entity.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }
}
