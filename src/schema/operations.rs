//! CRUD operation synthesis: for each entity, the read-one/read-all/count
//! query fields and the seven mutation fields (create one/many, update
//! one/many, batch update, delete one/many), together with their input and
//! payload types.

use crate::collapse::{attach_spec_from_tree, condense_associations, PresenceTree};
use crate::error::{ModelError, OpError};
use crate::gid;
use crate::model::{AssocIndex, EntityDescriptor, ModelRegistry, RelationshipKind};
use crate::naming::{
    connection_name, mutation_name, new_edge_field, query_name, to_camel, to_pascal, MutationKind,
    QueryKind,
};
use crate::schema::entity_type::{encode_cursor, scalar_name, to_one_field, EdgeCtx};
use crate::schema::type_cache::{shape_fingerprint, TypeCache};
use crate::sql::{build_batch_script, BatchItem};
use crate::store::{FindOptions, IncludeRef, Record, Store};
use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Object, Type, TypeRef,
};
use async_graphql::Value as GqlValue;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Source value for bulk mutation payloads.
struct BulkCtx {
    nodes: Vec<Record>,
    affected: u64,
}

/// Source value for the delete-one payload: the encoded id echoed back.
struct DeletedCtx {
    id: String,
}

/// Register the input/payload types for `entity` and append its operation
/// fields to the root query and mutation objects.
pub(crate) fn register_operations(
    entity: &EntityDescriptor,
    registry: &Arc<ModelRegistry>,
    index: &Arc<AssocIndex>,
    cache: &mut TypeCache,
    mut query: Object,
    mut mutation: Object,
) -> Result<(Object, Object), ModelError> {
    register_inputs(entity, registry, cache)?;
    register_payloads(entity, registry, index, cache)?;

    query = query
        .field(find_by_id_field(entity)?)
        .field(find_all_field(entity, registry))
        .field(count_field(entity, registry));

    mutation = mutation
        .field(create_one_field(entity, registry))
        .field(create_many_field(entity, registry))
        .field(update_one_field(entity, registry)?)
        .field(update_many_field(entity, registry))
        .field(batch_update_field(entity, registry))
        .field(delete_one_field(entity)?)
        .field(delete_many_field(entity, registry));

    Ok((query, mutation))
}

fn payload_name(entity: &str, op: &str) -> String {
    format!("{op}{entity}Payload")
}

fn input_arg_name(entity: &str, kind: MutationKind) -> String {
    format!("{}Input", to_pascal(&mutation_name(entity, kind)))
}

/// Scalar type-ref name for an attribute as it appears in inputs: key
/// attributes travel as opaque ids.
fn input_scalar(entity: &EntityDescriptor, attr_name: &str) -> &'static str {
    let attr = match entity.attribute(attr_name) {
        Some(a) => a,
        None => return TypeRef::STRING,
    };
    if attr.primary_key || attr.references.is_some() {
        TypeRef::ID
    } else {
        scalar_name(attr.kind)
    }
}

// ---------------------------------------------------------------------------
// input types

/// Flat values input: one field per writable attribute. Every field is
/// optional, even where the object type is non-nullable, so callers can
/// supply partial rows and let storage defaults fill the rest.
fn flat_values_input(name: &str, entity: &EntityDescriptor, include_pk: bool) -> (InputObject, u64) {
    let mut input = InputObject::new(name);
    let mut shape = Vec::new();
    for attr in &entity.attributes {
        if attr.auto_managed {
            continue;
        }
        if attr.primary_key && !include_pk {
            continue;
        }
        let base = input_scalar(entity, &attr.name);
        shape.push(format!("{}:{base}", to_camel(&attr.name)));
        input = input.field(InputValue::new(to_camel(&attr.name), TypeRef::named(base)));
    }
    (input, shape_fingerprint(&shape))
}

/// Exact-match filter input covering every attribute.
fn where_input(name: &str, entity: &EntityDescriptor) -> (InputObject, u64) {
    let mut input = InputObject::new(name);
    let mut shape = Vec::new();
    for attr in &entity.attributes {
        let base = input_scalar(entity, &attr.name);
        shape.push(format!("{}:{base}", to_camel(&attr.name)));
        input = input.field(InputValue::new(to_camel(&attr.name), TypeRef::named(base)));
    }
    (input, shape_fingerprint(&shape))
}

/// Nested-create input for one entity: writable attributes plus one key per
/// declared relationship, referencing the targets' related inputs by name.
/// Memoized through the cache so cyclic entity graphs register each once.
fn register_related_input(
    entity_name: &str,
    registry: &ModelRegistry,
    cache: &mut TypeCache,
) -> Result<(), ModelError> {
    let name = format!("{entity_name}RelatedInput");
    if cache.contains(&name) {
        return Ok(());
    }
    let entity = registry.require(entity_name)?;
    let (mut input, _) = flat_values_input(&name, entity, true);
    let mut shape = vec![format!("__flat:{entity_name}")];
    for (rel_key, rel) in &entity.relationships {
        let target_input = format!("{}RelatedInput", rel.target);
        let type_ref = match rel.kind {
            RelationshipKind::ToOne => TypeRef::named(&target_input),
            _ => TypeRef::named_nn_list(&target_input),
        };
        shape.push(format!("{rel_key}:{target_input}"));
        input = input.field(InputValue::new(rel_key, type_ref));
    }
    cache.get_or_create(&name, shape_fingerprint(&shape), || {
        Type::InputObject(input)
    })?;
    for rel in entity.relationships.values() {
        register_related_input(&rel.target, registry, cache)?;
    }
    Ok(())
}

fn register_inputs(
    entity: &EntityDescriptor,
    registry: &ModelRegistry,
    cache: &mut TypeCache,
) -> Result<(), ModelError> {
    let e = &entity.name;

    let (w, fp) = where_input(&format!("{e}WhereInput"), entity);
    cache.get_or_create(&format!("{e}WhereInput"), fp, || Type::InputObject(w))?;
    let (w, fp) = where_input(&format!("Update{e}WhereInput"), entity);
    cache.get_or_create(&format!("Update{e}WhereInput"), fp, || Type::InputObject(w))?;
    let (w, fp) = where_input(&format!("BatchUpdate{e}WhereInput"), entity);
    cache.get_or_create(&format!("BatchUpdate{e}WhereInput"), fp, || {
        Type::InputObject(w)
    })?;

    let (v, fp) = flat_values_input(&format!("Create{e}ValuesInput"), entity, true);
    cache.get_or_create(&format!("Create{e}ValuesInput"), fp, || Type::InputObject(v))?;
    let (v, fp) = flat_values_input(&format!("Update{e}ValuesInput"), entity, false);
    cache.get_or_create(&format!("Update{e}ValuesInput"), fp, || Type::InputObject(v))?;
    let (v, fp) = flat_values_input(&format!("BatchUpdate{e}ValuesInput"), entity, false);
    cache.get_or_create(&format!("BatchUpdate{e}ValuesInput"), fp, || {
        Type::InputObject(v)
    })?;

    register_related_input(e, registry, cache)?;

    // create-one argument: writable attributes plus nested relationship keys
    let create_name = input_arg_name(e, MutationKind::CreateOne);
    let (mut create, _) = flat_values_input(&create_name, entity, true);
    let mut create_shape = vec![format!("__flat:{e}!")];
    for (rel_key, rel) in &entity.relationships {
        let target_input = format!("{}RelatedInput", rel.target);
        let type_ref = match rel.kind {
            RelationshipKind::ToOne => TypeRef::named(&target_input),
            _ => TypeRef::named_nn_list(&target_input),
        };
        create_shape.push(format!("{rel_key}:{target_input}"));
        create = create.field(InputValue::new(rel_key, type_ref));
    }
    cache.get_or_create(&create_name, shape_fingerprint(&create_shape), || {
        Type::InputObject(create)
    })?;

    let many_name = input_arg_name(e, MutationKind::Create);
    let many = InputObject::new(&many_name).field(InputValue::new(
        "values",
        TypeRef::named_nn_list_nn(format!("Create{e}ValuesInput")),
    ));
    cache.get_or_create(&many_name, shape_fingerprint(&[format!("values:[Create{e}ValuesInput!]!")]), || {
        Type::InputObject(many)
    })?;

    let upd_name = input_arg_name(e, MutationKind::UpdateOne);
    let upd = InputObject::new(&upd_name)
        .field(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
        .field(InputValue::new(
            "values",
            TypeRef::named_nn(format!("Update{e}ValuesInput")),
        ));
    cache.get_or_create(&upd_name, shape_fingerprint(&["id:ID!".to_string(), format!("values:Update{e}ValuesInput!")]), || {
        Type::InputObject(upd)
    })?;

    let updm_name = input_arg_name(e, MutationKind::Update);
    let updm = InputObject::new(&updm_name)
        .field(InputValue::new(
            "values",
            TypeRef::named_nn(format!("Update{e}ValuesInput")),
        ))
        .field(InputValue::new(
            "where",
            TypeRef::named_nn(format!("Update{e}WhereInput")),
        ));
    cache.get_or_create(&updm_name, shape_fingerprint(&[format!("values:Update{e}ValuesInput!"), format!("where:Update{e}WhereInput!")]), || {
        Type::InputObject(updm)
    })?;

    let item_name = format!("{e}BatchUpdateInput");
    let item = InputObject::new(&item_name)
        .field(InputValue::new(
            "values",
            TypeRef::named_nn(format!("BatchUpdate{e}ValuesInput")),
        ))
        .field(InputValue::new(
            "where",
            TypeRef::named_nn(format!("BatchUpdate{e}WhereInput")),
        ));
    cache.get_or_create(&item_name, shape_fingerprint(&[format!("values:BatchUpdate{e}ValuesInput!"), format!("where:BatchUpdate{e}WhereInput!")]), || {
        Type::InputObject(item)
    })?;

    let batch_name = input_arg_name(e, MutationKind::BatchUpdate);
    let batch = InputObject::new(&batch_name).field(InputValue::new(
        "items",
        TypeRef::named_nn_list_nn(&item_name),
    ));
    cache.get_or_create(&batch_name, shape_fingerprint(&[format!("items:[{item_name}!]!")]), || {
        Type::InputObject(batch)
    })?;

    let del_name = input_arg_name(e, MutationKind::DeleteOne);
    let del = InputObject::new(&del_name).field(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)));
    cache.get_or_create(&del_name, shape_fingerprint(&["id:ID!"]), || {
        Type::InputObject(del)
    })?;

    let delm_name = input_arg_name(e, MutationKind::Delete);
    let delm = InputObject::new(&delm_name).field(InputValue::new(
        "where",
        TypeRef::named_nn(format!("{e}WhereInput")),
    ));
    cache.get_or_create(&delm_name, shape_fingerprint(&[format!("where:{e}WhereInput!")]), || {
        Type::InputObject(delm)
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// payload types

/// Field resolving the mutation's record itself off the payload source.
fn record_field(field_name: &str, type_name: &str) -> Field {
    Field::new(field_name, TypeRef::named(type_name), move |ctx| {
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<Record>()?;
            Ok(Some(FieldValue::owned_any(row.clone())))
        })
    })
}

/// Field wrapping the payload's record into a freshly created edge for one
/// relationship that points at this entity.
fn new_edge_payload_field(field_name: &str, edge_type: &str) -> Field {
    Field::new(field_name, TypeRef::named(edge_type), move |ctx| {
        FieldFuture::new(async move {
            let row = ctx.parent_value.try_downcast_ref::<Record>()?;
            Ok(Some(FieldValue::owned_any(EdgeCtx {
                cursor: encode_cursor(0),
                node: row.clone(),
                join: None,
            })))
        })
    })
}

/// Payload whose source is the mutated record: the record field, one new-edge
/// field per many-valued relationship pointing at the entity, one related
/// field per owning relationship the entity declares.
fn register_record_payload(
    name: &str,
    entity: &EntityDescriptor,
    registry: &ModelRegistry,
    index: &AssocIndex,
    cache: &mut TypeCache,
) -> Result<(), ModelError> {
    let record_field_name = to_camel(&entity.name);
    let mut shape = vec![format!("{record_field_name}:{}", entity.name)];
    let mut obj = Object::new(name).field(record_field(&record_field_name, &entity.name));

    for edge in index.pointing_at(&entity.name) {
        if edge.is_to_one() {
            continue;
        }
        let field_name = new_edge_field(&edge.from, &edge.key);
        let edge_type = format!("{}Edge", connection_name(&edge.from, &edge.key));
        shape.push(format!("{field_name}:{edge_type}"));
        obj = obj.field(new_edge_payload_field(&field_name, &edge_type));
    }

    for edge in index.declared_by(&entity.name) {
        if !edge.is_to_one() {
            continue;
        }
        let target = registry.require(&edge.to)?;
        let target_pk = target
            .primary_key()
            .ok_or_else(|| ModelError::InvalidPrimaryKey {
                entity: target.name.clone(),
                attribute: "<none>".into(),
            })?;
        shape.push(format!("{}:{}", edge.key, edge.to));
        obj = obj.field(to_one_field(&edge.key, &edge.to, &target_pk.name, &edge.foreign_key));
    }

    cache.get_or_create(name, shape_fingerprint(&shape), || Type::Object(obj))
}

/// Payload whose source is a `BulkCtx`: the affected nodes plus a row count.
fn register_bulk_payload(
    name: &str,
    entity: &EntityDescriptor,
    cache: &mut TypeCache,
    with_nodes: bool,
) -> Result<(), ModelError> {
    let mut obj = Object::new(name);
    let mut shape = Vec::new();
    if with_nodes {
        shape.push(format!("nodes:[{}!]!", entity.name));
        obj = obj.field(Field::new(
            "nodes",
            TypeRef::named_nn_list_nn(&entity.name),
            |ctx| {
                FieldFuture::new(async move {
                    let bulk = ctx.parent_value.try_downcast_ref::<BulkCtx>()?;
                    let items = bulk.nodes.iter().cloned().map(FieldValue::owned_any);
                    Ok(Some(FieldValue::list(items)))
                })
            },
        ));
    }
    shape.push("affectedCount:Int!".into());
    obj = obj.field(Field::new(
        "affectedCount",
        TypeRef::named_nn(TypeRef::INT),
        |ctx| {
            FieldFuture::new(async move {
                let bulk = ctx.parent_value.try_downcast_ref::<BulkCtx>()?;
                Ok(Some(GqlValue::from(bulk.affected)))
            })
        },
    ));
    cache.get_or_create(name, shape_fingerprint(&shape), || Type::Object(obj))
}

fn register_payloads(
    entity: &EntityDescriptor,
    registry: &ModelRegistry,
    index: &AssocIndex,
    cache: &mut TypeCache,
) -> Result<(), ModelError> {
    let e = &entity.name;
    register_record_payload(&payload_name(e, "Create"), entity, registry, index, cache)?;
    register_record_payload(&payload_name(e, "Update"), entity, registry, index, cache)?;
    register_bulk_payload(&payload_name(e, "CreateMany"), entity, cache, true)?;
    register_bulk_payload(&payload_name(e, "UpdateMany"), entity, cache, true)?;
    register_bulk_payload(&payload_name(e, "BatchUpdate"), entity, cache, true)?;
    register_bulk_payload(&payload_name(e, "DeleteMany"), entity, cache, false)?;

    let deleted_field = format!("deleted{e}Id");
    let del_name = payload_name(e, "Delete");
    let del = Object::new(&del_name).field(Field::new(
        &deleted_field,
        TypeRef::named_nn(TypeRef::ID),
        |ctx| {
            FieldFuture::new(async move {
                let d = ctx.parent_value.try_downcast_ref::<DeletedCtx>()?;
                Ok(Some(GqlValue::String(d.id.clone())))
            })
        },
    ));
    cache.get_or_create(&del_name, shape_fingerprint(&[format!("{deleted_field}:ID!")]), || {
        Type::Object(del)
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// query fields

fn pk_of(entity: &EntityDescriptor) -> Result<String, ModelError> {
    entity
        .primary_key()
        .map(|a| a.name.clone())
        .ok_or_else(|| ModelError::InvalidPrimaryKey {
            entity: entity.name.clone(),
            attribute: "<none>".into(),
        })
}

fn find_by_id_field(entity: &EntityDescriptor) -> Result<Field, ModelError> {
    let entity_name = entity.name.clone();
    let pk_name = pk_of(entity)?;
    let field = Field::new(
        query_name(&entity.name, QueryKind::FindById),
        TypeRef::named(&entity.name),
        move |ctx| {
            let entity_name = entity_name.clone();
            let pk_name = pk_name.clone();
            FieldFuture::new(async move {
                let encoded = ctx.args.try_get("id")?.string()?.to_string();
                let id = gid::decode_expecting(&encoded, &entity_name)?;
                let store = ctx.data::<Arc<dyn Store>>()?;
                let mut filter = Record::new();
                filter.insert(pk_name, gid::coerce_key(&id.key));
                let found = store
                    .find_one(&entity_name, &filter)
                    .await
                    .map_err(OpError::from)?;
                Ok(found.map(FieldValue::owned_any))
            })
        },
    )
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)));
    Ok(field)
}

/// Pull `where`, decoding key attributes back to raw storage values.
fn where_filter(
    ctx: &async_graphql::dynamic::ResolverContext<'_>,
    entity: &EntityDescriptor,
) -> async_graphql::Result<Record> {
    let mut filter = match ctx.args.get("where") {
        Some(v) => v
            .deserialize::<Value>()?
            .as_object()
            .cloned()
            .unwrap_or_default(),
        None => Record::new(),
    };
    gid::decode_record_keys(entity, &mut filter)?;
    Ok(filter)
}

fn find_all_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    Field::new(
        query_name(&entity.name, QueryKind::FindAll),
        TypeRef::named_nn_list_nn(&entity.name),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let mut opts = FindOptions::default();
                opts.filter = where_filter(&ctx, entity)?;
                if let Some(v) = ctx.args.get("limit") {
                    opts.limit = Some(v.u64()?);
                }
                if let Some(v) = ctx.args.get("offset") {
                    opts.offset = Some(v.u64()?);
                }
                if let Some(v) = ctx.args.get("order") {
                    opts.order = Some(v.string()?.to_string());
                }
                let store = ctx.data::<Arc<dyn Store>>()?;
                let rows = store
                    .find_all(&entity_name, &opts)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::list(rows.into_iter().map(FieldValue::owned_any))))
            })
        },
    )
    .argument(InputValue::new(
        "where",
        TypeRef::named(format!("{}WhereInput", entity.name)),
    ))
    .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("order", TypeRef::named(TypeRef::STRING)))
}

fn count_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    Field::new(
        query_name(&entity.name, QueryKind::Count),
        TypeRef::named_nn(TypeRef::INT),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let mut opts = FindOptions::default();
                opts.filter = where_filter(&ctx, entity)?;
                // include keys naming declared relationships are re-targeted
                // onto the relationship's target entity, aliased by the key
                if let Some(v) = ctx.args.get("include") {
                    for item in v.list()?.iter() {
                        let alias = item.string()?;
                        if let Some(rel) = entity.relationships.get(alias) {
                            opts.includes.push(IncludeRef {
                                entity: rel.target.clone(),
                                alias: alias.to_string(),
                            });
                        }
                    }
                }
                let store = ctx.data::<Arc<dyn Store>>()?;
                let n = store
                    .count(&entity_name, &opts)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(GqlValue::from(n)))
            })
        },
    )
    .argument(InputValue::new(
        "where",
        TypeRef::named(format!("{}WhereInput", entity.name)),
    ))
    .argument(InputValue::new(
        "include",
        TypeRef::named_nn_list(TypeRef::STRING),
    ))
}

// ---------------------------------------------------------------------------
// mutation fields

fn input_value(ctx: &async_graphql::dynamic::ResolverContext<'_>) -> async_graphql::Result<Value> {
    Ok(ctx.args.try_get("input")?.deserialize::<Value>()?)
}

fn object_map(v: &Value) -> Record {
    v.as_object().cloned().unwrap_or_default()
}

/// Reject values the type system cannot check (malformed uuid or date-time
/// strings). Key attributes were already decoded; nested relationship keys
/// are not values.
fn check_values(entity: &EntityDescriptor, values: &Record) -> Result<(), OpError> {
    for (name, value) in values {
        let Some(attr) = entity.attribute(name) else { continue };
        if entity.is_key_attribute(name) {
            continue;
        }
        if !attr.kind.accepts(value) {
            return Err(OpError::Validation(format!(
                "{}.{name}: value does not match {:?}",
                entity.name, attr.kind
            )));
        }
    }
    Ok(())
}

fn create_one_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::CreateOne);
    Field::new(
        mutation_name(&entity.name, MutationKind::CreateOne),
        TypeRef::named(payload_name(&entity.name, "Create")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;

                let mut tree = PresenceTree::new();
                condense_associations(&mut tree, &[], &entity.relationships, &registry, Some(&input));
                let attach = attach_spec_from_tree(&tree, &entity.relationships, &registry);
                debug!(entity = %entity_name, ?attach, "eager attach for nested create");

                // global ids are decoded at the root level only; nested
                // payload rows reach the collaborator as given
                let mut values = object_map(&input);
                gid::decode_record_keys(entity, &mut values)?;
                check_values(entity, &values)?;

                let store = ctx.data::<Arc<dyn Store>>()?;
                let record = store
                    .create(&entity_name, &values, &attach)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::owned_any(record)))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)))
}

fn create_many_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::Create);
    Field::new(
        mutation_name(&entity.name, MutationKind::Create),
        TypeRef::named(payload_name(&entity.name, "CreateMany")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;
                let mut rows = Vec::new();
                if let Some(values) = input.get("values").and_then(Value::as_array) {
                    for v in values {
                        let mut row = object_map(v);
                        gid::decode_record_keys(entity, &mut row)?;
                        check_values(entity, &row)?;
                        rows.push(row);
                    }
                }
                let store = ctx.data::<Arc<dyn Store>>()?;
                let nodes = store
                    .bulk_create(&entity_name, &rows)
                    .await
                    .map_err(OpError::from)?;
                let affected = nodes.len() as u64;
                Ok(Some(FieldValue::owned_any(BulkCtx { nodes, affected })))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)))
}

fn update_one_field(
    entity: &EntityDescriptor,
    registry: &Arc<ModelRegistry>,
) -> Result<Field, ModelError> {
    let entity_name = entity.name.clone();
    let pk_name = pk_of(entity)?;
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::UpdateOne);
    let field = Field::new(
        mutation_name(&entity.name, MutationKind::UpdateOne),
        TypeRef::named(payload_name(&entity.name, "Update")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let pk_name = pk_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;
                let encoded = input
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| OpError::Validation("missing id".into()))?;
                let id = gid::decode_expecting(encoded, &entity_name)?;
                let mut values = object_map(input.get("values").unwrap_or(&Value::Null));
                gid::decode_record_keys(entity, &mut values)?;
                check_values(entity, &values)?;
                let mut filter = Record::new();
                filter.insert(pk_name, gid::coerce_key(&id.key));

                let store = ctx.data::<Arc<dyn Store>>()?;
                store
                    .update(&entity_name, &values, &filter)
                    .await
                    .map_err(OpError::from)?;
                // payload carries the post-update state, re-read by key
                let found = store
                    .find_one(&entity_name, &filter)
                    .await
                    .map_err(OpError::from)?;
                Ok(found.map(FieldValue::owned_any))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)));
    Ok(field)
}

fn update_many_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::Update);
    Field::new(
        mutation_name(&entity.name, MutationKind::Update),
        TypeRef::named(payload_name(&entity.name, "UpdateMany")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;
                let mut values = object_map(input.get("values").unwrap_or(&Value::Null));
                gid::decode_record_keys(entity, &mut values)?;
                check_values(entity, &values)?;
                let mut filter = object_map(input.get("where").unwrap_or(&Value::Null));
                gid::decode_record_keys(entity, &mut filter)?;

                let store = ctx.data::<Arc<dyn Store>>()?;
                let affected = store
                    .update(&entity_name, &values, &filter)
                    .await
                    .map_err(OpError::from)?;
                let mut opts = FindOptions::default();
                opts.filter = filter;
                let nodes = store
                    .find_all(&entity_name, &opts)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::owned_any(BulkCtx { nodes, affected })))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)))
}

fn batch_update_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::BatchUpdate);
    Field::new(
        mutation_name(&entity.name, MutationKind::BatchUpdate),
        TypeRef::named(payload_name(&entity.name, "BatchUpdate")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;
                let mut items = Vec::new();
                if let Some(list) = input.get("items").and_then(Value::as_array) {
                    for item in list {
                        let mut values = object_map(item.get("values").unwrap_or(&Value::Null));
                        gid::decode_record_keys(entity, &mut values)?;
                        check_values(entity, &values)?;
                        let mut filter = object_map(item.get("where").unwrap_or(&Value::Null));
                        gid::decode_record_keys(entity, &mut filter)?;
                        items.push(BatchItem { values, filter });
                    }
                }

                let store = ctx.data::<Arc<dyn Store>>()?;
                let script = build_batch_script(store.dialect(), &entity_name, &items)?;
                let affected = store.raw_execute(&script).await.map_err(OpError::from)?;

                // read back every row matching any of the per-item filters
                let mut opts = FindOptions::default();
                opts.any_of = items.into_iter().map(|i| i.filter).collect();
                let nodes = store
                    .find_all(&entity_name, &opts)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::owned_any(BulkCtx { nodes, affected })))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)))
}

fn delete_one_field(entity: &EntityDescriptor) -> Result<Field, ModelError> {
    let entity_name = entity.name.clone();
    let pk_name = pk_of(entity)?;
    let arg_type = input_arg_name(&entity.name, MutationKind::DeleteOne);
    let field = Field::new(
        mutation_name(&entity.name, MutationKind::DeleteOne),
        TypeRef::named(payload_name(&entity.name, "Delete")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let pk_name = pk_name.clone();
            FieldFuture::new(async move {
                let input = input_value(&ctx)?;
                let encoded = input
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| OpError::Validation("missing id".into()))?
                    .to_string();
                let id = gid::decode_expecting(&encoded, &entity_name)?;
                let mut filter = Record::new();
                filter.insert(pk_name, gid::coerce_key(&id.key));
                let store = ctx.data::<Arc<dyn Store>>()?;
                store
                    .destroy(&entity_name, &filter)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::owned_any(DeletedCtx { id: encoded })))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)));
    Ok(field)
}

fn delete_many_field(entity: &EntityDescriptor, registry: &Arc<ModelRegistry>) -> Field {
    let entity_name = entity.name.clone();
    let registry = Arc::clone(registry);
    let arg_type = input_arg_name(&entity.name, MutationKind::Delete);
    Field::new(
        mutation_name(&entity.name, MutationKind::Delete),
        TypeRef::named(payload_name(&entity.name, "DeleteMany")),
        move |ctx| {
            let entity_name = entity_name.clone();
            let registry = Arc::clone(&registry);
            FieldFuture::new(async move {
                let entity = registry.require(&entity_name)?;
                let input = input_value(&ctx)?;
                let mut filter = object_map(input.get("where").unwrap_or(&Value::Null));
                gid::decode_record_keys(entity, &mut filter)?;
                let store = ctx.data::<Arc<dyn Store>>()?;
                let affected = store
                    .destroy(&entity_name, &filter)
                    .await
                    .map_err(OpError::from)?;
                Ok(Some(FieldValue::owned_any(BulkCtx {
                    nodes: Vec::new(),
                    affected,
                })))
            })
        },
    )
    .argument(InputValue::new("input", TypeRef::named_nn(arg_type)))
}
