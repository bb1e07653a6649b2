//! Descriptor validation: referential integrity across the whole registry,
//! run once before any type synthesis.

use crate::error::ModelError;
use crate::model::{ModelRegistry, RelationshipKind};

pub fn validate(registry: &ModelRegistry) -> Result<(), ModelError> {
    for entity in registry.entities() {
        let pk = entity.primary_key().ok_or_else(|| ModelError::InvalidPrimaryKey {
            entity: entity.name.clone(),
            attribute: "<none>".into(),
        })?;
        if entity.attributes.iter().filter(|a| a.primary_key).count() > 1 {
            return Err(ModelError::InvalidPrimaryKey {
                entity: entity.name.clone(),
                attribute: pk.name.clone(),
            });
        }

        for attr in &entity.attributes {
            if let Some(target) = &attr.references {
                registry.require(target)?;
            }
        }

        for rel in entity.relationships.values() {
            let target = registry.require(&rel.target)?;
            match &rel.kind {
                RelationshipKind::ToOne => {
                    // FK lives on this entity.
                    if entity.attribute(&rel.foreign_key).is_none() {
                        return Err(ModelError::MissingAttribute {
                            entity: entity.name.clone(),
                            attribute: rel.foreign_key.clone(),
                        });
                    }
                }
                RelationshipKind::ToMany => {
                    // FK lives on the target.
                    if target.attribute(&rel.foreign_key).is_none() {
                        return Err(ModelError::MissingAttribute {
                            entity: rel.target.clone(),
                            attribute: rel.foreign_key.clone(),
                        });
                    }
                }
                RelationshipKind::ToManyThrough { join_entity } => {
                    let join = registry.require(join_entity)?;
                    if join.attribute(&rel.foreign_key).is_none() {
                        return Err(ModelError::MissingAttribute {
                            entity: join_entity.clone(),
                            attribute: rel.foreign_key.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, AttributeKind, EntityDescriptor, RelationshipDescriptor};
    use std::collections::BTreeMap;

    fn attr(name: &str, pk: bool) -> AttributeDescriptor {
        AttributeDescriptor {
            name: name.into(),
            kind: AttributeKind::Int,
            nullable: !pk,
            primary_key: pk,
            references: None,
            auto_managed: false,
        }
    }

    #[test]
    fn missing_primary_key_rejected() {
        let mut reg = ModelRegistry::new();
        reg.register(EntityDescriptor {
            name: "User".into(),
            attributes: vec![attr("email", false)],
            relationships: BTreeMap::new(),
        })
        .unwrap();
        assert!(matches!(validate(&reg), Err(ModelError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn dangling_relationship_target_rejected() {
        let mut reg = ModelRegistry::new();
        let mut relationships = BTreeMap::new();
        relationships.insert(
            "todos".into(),
            RelationshipDescriptor {
                kind: crate::model::RelationshipKind::ToMany,
                target: "Todo".into(),
                foreign_key: "userId".into(),
            },
        );
        reg.register(EntityDescriptor {
            name: "User".into(),
            attributes: vec![attr("id", true)],
            relationships,
        })
        .unwrap();
        assert!(matches!(validate(&reg), Err(ModelError::MissingEntity(_))));
    }
}
