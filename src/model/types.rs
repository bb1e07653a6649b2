//! Entity descriptors: the relational model the synthesizer reads. Owned by
//! the caller (typically exported from the storage engine's model registry)
//! and never mutated here.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar kind of one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Int,
    Float,
    Bool,
    Uuid,
    DateTime,
    Json,
}

impl AttributeKind {
    /// Whether an inbound value is acceptable for this kind. Uuid and
    /// date-time attributes travel as strings, so the type system cannot
    /// check them; nulls are the nullability check's problem, not ours.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        if value.is_null() {
            return true;
        }
        match self {
            AttributeKind::String => value.is_string(),
            AttributeKind::Int => value.is_i64() || value.is_u64(),
            AttributeKind::Float => value.is_number(),
            AttributeKind::Bool => value.is_boolean(),
            AttributeKind::Uuid => matches!(value, Value::String(s) if uuid::Uuid::parse_str(s).is_ok()),
            AttributeKind::DateTime => matches!(
                value,
                Value::String(s) if chrono::DateTime::parse_from_rfc3339(s).is_ok()
            ),
            AttributeKind::Json => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Entity this attribute is a foreign key to, if any.
    #[serde(default)]
    pub references: Option<String>,
    /// Set on storage-managed columns (createdAt/updatedAt); exposed on
    /// output types, excluded from create/update value inputs.
    #[serde(default)]
    pub auto_managed: bool,
}

fn default_true() -> bool {
    true
}

/// Kind of a declared relationship, matched exhaustively wherever behavior
/// diverges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Owning side: this entity holds the foreign key.
    ToOne,
    ToMany,
    /// Many-to-many through a join entity; the join entity's own attributes
    /// become edge attributes.
    ToManyThrough { join_entity: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    #[serde(flatten)]
    pub kind: RelationshipKind,
    pub target: String,
    /// Foreign-key attribute: on this entity for ToOne, on the target for
    /// ToMany, on the join entity for ToManyThrough.
    pub foreign_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
    /// Declared relationships, keyed by the relationship name used in
    /// payloads and generated fields.
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipDescriptor>,
}

impl EntityDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn primary_key(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.primary_key)
    }

    /// Whether `name` is a primary- or foreign-key attribute, i.e. carried as
    /// an opaque global id on the external surface.
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.attribute(name)
            .map(|a| a.primary_key || a.references.is_some())
            .unwrap_or(false)
    }
}

/// All entity descriptors for one schema build, keyed by entity name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    entities: BTreeMap<String, EntityDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityDescriptor) -> Result<(), ModelError> {
        if self.entities.contains_key(&entity.name) {
            return Err(ModelError::DuplicateEntityName(entity.name));
        }
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&EntityDescriptor, ModelError> {
        self.get(name).ok_or_else(|| ModelError::MissingEntity(name.to_string()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> EntityDescriptor {
        EntityDescriptor {
            name: "User".into(),
            attributes: vec![AttributeDescriptor {
                name: "id".into(),
                kind: AttributeKind::Int,
                nullable: false,
                primary_key: true,
                references: None,
                auto_managed: false,
            }],
            relationships: BTreeMap::new(),
        }
    }

    #[test]
    fn duplicate_entity_rejected() {
        let mut reg = ModelRegistry::new();
        reg.register(user()).unwrap();
        assert!(matches!(
            reg.register(user()),
            Err(ModelError::DuplicateEntityName(_))
        ));
    }

    #[test]
    fn key_attributes_detected() {
        let u = user();
        assert!(u.is_key_attribute("id"));
        assert!(!u.is_key_attribute("email"));
        assert_eq!(u.primary_key().map(|a| a.name.as_str()), Some("id"));
    }

    #[test]
    fn scalar_kinds_check_inbound_values() {
        use serde_json::json;
        assert!(AttributeKind::DateTime.accepts(&json!("2024-05-01T12:00:00Z")));
        assert!(!AttributeKind::DateTime.accepts(&json!("yesterday")));
        assert!(AttributeKind::Uuid.accepts(&json!("6e4ef9d0-5bd8-49c5-a30a-7e4c22a07a70")));
        assert!(!AttributeKind::Uuid.accepts(&json!("nope")));
        assert!(AttributeKind::Int.accepts(&json!(3)));
        assert!(!AttributeKind::Int.accepts(&json!(3.5)));
        // null defers to the nullability check
        assert!(AttributeKind::Uuid.accepts(&json!(null)));
    }

    #[test]
    fn relationship_kind_deserializes_tagged() {
        let r: RelationshipDescriptor = serde_json::from_value(serde_json::json!({
            "kind": "to_many_through",
            "join_entity": "TodoAssignee",
            "target": "Todo",
            "foreign_key": "UserId",
        }))
        .unwrap();
        assert_eq!(
            r.kind,
            RelationshipKind::ToManyThrough { join_entity: "TodoAssignee".into() }
        );
    }
}
