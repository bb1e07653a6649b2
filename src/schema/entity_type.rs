//! Per-entity GraphQL object synthesis: one object type per entity, one
//! connection/edge pair per to-many relationship. Relationship fields
//! reference their target types by name only, so entity graphs with cycles
//! register cleanly in any order.

use crate::error::{ModelError, OpError};
use crate::gid;
use crate::model::{AttributeKind, EntityDescriptor, ModelRegistry, RelationshipKind};
use crate::naming::{connection_name, to_camel};
use crate::schema::type_cache::{shape_fingerprint, TypeCache};
use crate::store::{Record, Store};
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, Object, Type, TypeRef};
use async_graphql::Value as GqlValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::sync::Arc;

/// Interface implemented by every entity object; backs the generic `node`
/// lookup on the root query.
pub(crate) const NODE_INTERFACE: &str = "Node";

/// Built-in scalar backing an attribute kind. Uuid, date-time, and json
/// attributes travel as their string renderings.
pub(crate) fn scalar_name(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Int => TypeRef::INT,
        AttributeKind::Float => TypeRef::FLOAT,
        AttributeKind::Bool => TypeRef::BOOLEAN,
        AttributeKind::String
        | AttributeKind::Uuid
        | AttributeKind::DateTime
        | AttributeKind::Json => TypeRef::STRING,
    }
}

pub(crate) fn json_to_gql(value: &Value) -> GqlValue {
    GqlValue::from_json(value.clone()).unwrap_or(GqlValue::Null)
}

pub(crate) fn encode_cursor(offset: u64) -> String {
    STANDARD.encode(format!("offset:{offset}"))
}

pub(crate) fn decode_cursor(cursor: &str) -> Result<u64, OpError> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|_| OpError::Decode(cursor.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| OpError::Decode(cursor.to_string()))?;
    text.strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| OpError::Decode(cursor.to_string()))
}

/// Resolved edge handed between the connection resolver and its field
/// resolvers. `join` carries the join-entity record for many-to-many edges.
#[derive(Clone)]
pub(crate) struct EdgeCtx {
    pub cursor: String,
    pub node: Record,
    pub join: Option<Record>,
}

#[derive(Clone)]
pub(crate) struct ConnectionCtx {
    pub edges: Vec<EdgeCtx>,
    pub total: u64,
}

/// Register the object type for `entity` plus the connection and edge types
/// of its to-many relationships.
pub(crate) fn register_entity_type(
    entity: &EntityDescriptor,
    registry: &ModelRegistry,
    cache: &mut TypeCache,
) -> Result<(), ModelError> {
    let pk = entity
        .primary_key()
        .ok_or_else(|| ModelError::InvalidPrimaryKey {
            entity: entity.name.clone(),
            attribute: "<none>".into(),
        })?;
    let pk_name = pk.name.clone();

    let mut shape: Vec<String> = Vec::new();
    let mut object = Object::new(&entity.name).implement(NODE_INTERFACE);

    // Relay-style opaque identifier. When the primary key is itself named
    // "id" its field below doubles as this one.
    if to_camel(&pk_name) != "id" {
        object = object.field(gid_field("id", &entity.name, &pk_name));
        shape.push("id:ID!".into());
    }

    for attr in &entity.attributes {
        let field_name = to_camel(&attr.name);
        // pk encodes under this entity's name, fk under the referenced one
        let gid_type = if attr.primary_key {
            Some(entity.name.clone())
        } else {
            attr.references.clone()
        };
        let base = if gid_type.is_some() {
            TypeRef::ID
        } else {
            scalar_name(attr.kind)
        };
        let type_ref = if attr.nullable && !attr.primary_key {
            TypeRef::named(base)
        } else {
            TypeRef::named_nn(base)
        };
        shape.push(format!("{field_name}:{base}"));
        let attr_name = attr.name.clone();
        object = object.field(Field::new(field_name, type_ref, move |ctx| {
            let attr_name = attr_name.clone();
            let gid_type = gid_type.clone();
            FieldFuture::new(async move {
                let row = ctx.parent_value.try_downcast_ref::<Record>()?;
                let raw = row.get(&attr_name).cloned().unwrap_or(Value::Null);
                if raw.is_null() {
                    return Ok(None);
                }
                Ok(Some(match gid_type {
                    Some(t) => GqlValue::String(gid::encode(&t, &raw)),
                    None => json_to_gql(&raw),
                }))
            })
        }));
    }

    for (rel_key, rel) in &entity.relationships {
        match &rel.kind {
            RelationshipKind::ToOne => {
                let target = registry.require(&rel.target)?;
                let target_pk = target
                    .primary_key()
                    .ok_or_else(|| ModelError::InvalidPrimaryKey {
                        entity: target.name.clone(),
                        attribute: "<none>".into(),
                    })?;
                shape.push(format!("{rel_key}:{}", rel.target));
                object = object.field(to_one_field(
                    rel_key,
                    &rel.target,
                    &target_pk.name,
                    &rel.foreign_key,
                ));
            }
            RelationshipKind::ToMany | RelationshipKind::ToManyThrough { .. } => {
                let base = connection_name(&entity.name, rel_key);
                let conn_type = format!("{base}Connection");
                let edge_type = format!("{base}Edge");
                register_connection_types(entity, rel_key, registry, cache, &conn_type, &edge_type)?;
                shape.push(format!("{rel_key}:{conn_type}"));
                object = object.field(connection_field(
                    &entity.name,
                    rel_key,
                    &pk_name,
                    &conn_type,
                ));
            }
        }
    }

    cache.get_or_create(&entity.name, shape_fingerprint(&shape), || {
        Type::Object(object)
    })
}

/// Non-null ID field resolving the encoded (type, primary key) pair.
fn gid_field(field_name: &str, type_name: &str, pk_name: &str) -> Field {
    let type_name = type_name.to_string();
    let pk_name = pk_name.to_string();
    Field::new(field_name, TypeRef::named_nn(TypeRef::ID), move |ctx| {
        let type_name = type_name.clone();
        let pk_name = pk_name.clone();
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<Record>()?;
            let raw = row.get(&pk_name).cloned().unwrap_or(Value::Null);
            if raw.is_null() {
                return Ok(None);
            }
            Ok(Some(GqlValue::String(gid::encode(&type_name, &raw))))
        })
    })
}

/// Owning-side relationship field: look the target up by the row's foreign
/// key. Nullable, a row with a null foreign key has no related record.
/// Mutation payloads reuse this for their related-record output fields.
pub(crate) fn to_one_field(rel_key: &str, target: &str, target_pk: &str, foreign_key: &str) -> Field {
    let target_owned = target.to_string();
    let target_pk = target_pk.to_string();
    let foreign_key = foreign_key.to_string();
    Field::new(rel_key, TypeRef::named(target), move |ctx| {
        let target = target_owned.clone();
        let target_pk = target_pk.clone();
        let foreign_key = foreign_key.clone();
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<Record>()?;
            let fk_value = row.get(&foreign_key).cloned().unwrap_or(Value::Null);
            if fk_value.is_null() {
                return Ok(None);
            }
            let store = ctx.data::<Arc<dyn Store>>()?;
            let mut filter = Record::new();
            filter.insert(target_pk, fk_value);
            let found = store
                .find_one(&target, &filter)
                .await
                .map_err(OpError::from)?;
            Ok(found.map(FieldValue::owned_any))
        })
    })
}

/// To-many relationship field: `first`/`after` paginated connection over the
/// collaborator's `related` accessor, total from `related_count`.
fn connection_field(entity: &str, rel_key: &str, pk_name: &str, conn_type: &str) -> Field {
    let entity = entity.to_string();
    let rel_owned = rel_key.to_string();
    let pk_name = pk_name.to_string();
    Field::new(rel_key, TypeRef::named_nn(conn_type), move |ctx| {
        let entity = entity.clone();
        let rel_key = rel_owned.clone();
        let pk_name = pk_name.clone();
        FieldFuture::new(async move {
            let store = ctx.data::<Arc<dyn Store>>()?;
            let row = ctx.parent_value.try_downcast_ref::<Record>()?;
            let parent_key = row.get(&pk_name).cloned().unwrap_or(Value::Null);
            let first = match ctx.args.get("first") {
                Some(v) => Some(v.u64()?),
                None => None,
            };
            // a cursor names the last row already seen
            let offset = match ctx.args.get("after") {
                Some(v) => decode_cursor(v.string()?)? + 1,
                None => 0,
            };
            let total = store
                .related_count(&entity, &rel_key, &parent_key)
                .await
                .map_err(OpError::from)?;
            let rows = store
                .related(&entity, &rel_key, &parent_key)
                .await
                .map_err(OpError::from)?;
            let take = first.map(|n| n as usize).unwrap_or(usize::MAX);
            let edges = rows
                .into_iter()
                .skip(offset as usize)
                .take(take)
                .enumerate()
                .map(|(i, related)| EdgeCtx {
                    cursor: encode_cursor(offset + i as u64),
                    node: related.node,
                    join: related.join,
                })
                .collect();
            Ok(Some(FieldValue::owned_any(ConnectionCtx { edges, total })))
        })
    })
    .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("after", TypeRef::named(TypeRef::STRING)))
}

fn register_connection_types(
    entity: &EntityDescriptor,
    rel_key: &str,
    registry: &ModelRegistry,
    cache: &mut TypeCache,
    conn_type: &str,
    edge_type: &str,
) -> Result<(), ModelError> {
    let rel = &entity.relationships[rel_key];

    let mut edge = Object::new(edge_type)
        .field(Field::new(
            "cursor",
            TypeRef::named_nn(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let e = ctx.parent_value.try_downcast_ref::<EdgeCtx>()?;
                    Ok(Some(GqlValue::String(e.cursor.clone())))
                })
            },
        ))
        .field(Field::new(
            "node",
            TypeRef::named_nn(&rel.target),
            |ctx| {
                FieldFuture::new(async move {
                    let e = ctx.parent_value.try_downcast_ref::<EdgeCtx>()?;
                    Ok(Some(FieldValue::owned_any(e.node.clone())))
                })
            },
        ));
    let mut edge_shape = vec!["cursor:String".to_string(), format!("node:{}", rel.target)];

    // Many-to-many edges expose the join entity's own attributes, read off
    // the join record.
    if let RelationshipKind::ToManyThrough { join_entity } = &rel.kind {
        let join = registry.require(join_entity)?;
        for attr in &join.attributes {
            if attr.primary_key || attr.references.is_some() {
                continue;
            }
            let field_name = to_camel(&attr.name);
            edge_shape.push(format!("{field_name}:{}", scalar_name(attr.kind)));
            let attr_name = attr.name.clone();
            edge = edge.field(Field::new(
                field_name,
                TypeRef::named(scalar_name(attr.kind)),
                move |ctx| {
                    let attr_name = attr_name.clone();
                    FieldFuture::new(async move {
                        let e = ctx.parent_value.try_downcast_ref::<EdgeCtx>()?;
                        let raw = e
                            .join
                            .as_ref()
                            .and_then(|j| j.get(&attr_name))
                            .cloned()
                            .unwrap_or(Value::Null);
                        if raw.is_null() {
                            return Ok(None);
                        }
                        Ok(Some(json_to_gql(&raw)))
                    })
                },
            ));
        }
    }

    cache.get_or_create(edge_type, shape_fingerprint(&edge_shape), || {
        Type::Object(edge)
    })?;

    let edge_owned = edge_type.to_string();
    let conn = Object::new(conn_type)
        .field(Field::new(
            "edges",
            TypeRef::named_nn_list_nn(edge_type),
            |ctx| {
                FieldFuture::new(async move {
                    let c = ctx.parent_value.try_downcast_ref::<ConnectionCtx>()?;
                    let items = c.edges.iter().cloned().map(FieldValue::owned_any);
                    Ok(Some(FieldValue::list(items)))
                })
            },
        ))
        .field(Field::new(
            "total",
            TypeRef::named_nn(TypeRef::INT),
            |ctx| {
                FieldFuture::new(async move {
                    let c = ctx.parent_value.try_downcast_ref::<ConnectionCtx>()?;
                    Ok(Some(GqlValue::from(c.total)))
                })
            },
        ));
    let conn_shape = [format!("edges:{edge_owned}"), "total:Int".to_string()];
    cache.get_or_create(conn_type, shape_fingerprint(&conn_shape), || {
        Type::Object(conn)
    })
}
