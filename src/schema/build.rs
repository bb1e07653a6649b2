//! Schema assembly: validate the descriptors, build the cross-reference
//! indices, synthesize every type and operation exactly once, and hand the
//! finished schema back. Resolvers share only `Arc`ed read-only data; the
//! type cache and indices live for this one call.

use crate::error::{ModelError, OpError};
use crate::gid;
use crate::model::{validate, AssocIndex, ModelRegistry};
use crate::schema::entity_type::{register_entity_type, NODE_INTERFACE};
use crate::schema::operations::register_operations;
use crate::schema::type_cache::TypeCache;
use crate::store::{Record, Store};
use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Interface, InterfaceField, Object, Schema, TypeRef,
};
use std::sync::Arc;
use tracing::debug;

/// Caller-built root fields merged verbatim into the generated schema.
#[derive(Default)]
pub struct SchemaOptions {
    pub custom_queries: Vec<Field>,
    pub custom_mutations: Vec<Field>,
}

/// Build the full schema for `registry`, wiring every generated resolver to
/// `store`. Fails as a whole on any descriptor or assembly problem; there is
/// no partial schema.
pub fn build_schema(
    registry: ModelRegistry,
    store: Arc<dyn Store>,
    options: SchemaOptions,
) -> Result<Schema, ModelError> {
    validate(&registry)?;
    let registry = Arc::new(registry);
    let index = Arc::new(AssocIndex::build(&registry));
    debug!(entities = registry.entities().count(), "assembling schema");

    let mut cache = TypeCache::new();
    let mut query = Object::new("Query");
    let mut mutation = Object::new("Mutation");

    for entity in registry.entities() {
        register_entity_type(entity, &registry, &mut cache)?;
        let (q, m) = register_operations(entity, &registry, &index, &mut cache, query, mutation)?;
        query = q;
        mutation = m;
    }

    query = query.field(node_field(&registry));
    for field in options.custom_queries {
        query = query.field(field);
    }
    for field in options.custom_mutations {
        mutation = mutation.field(field);
    }

    let node = Interface::new(NODE_INTERFACE)
        .field(InterfaceField::new("id", TypeRef::named_nn(TypeRef::ID)));

    let mut builder = Schema::build("Query", Some("Mutation"), None)
        .register(node)
        .register(query)
        .register(mutation)
        .data(store);
    for ty in cache.into_types() {
        builder = builder.register(ty);
    }
    builder
        .finish()
        .map_err(|e| ModelError::Assemble(e.to_string()))
}

/// Generic lookup by opaque identifier: decode, dispatch on the embedded
/// type name, resolve through `find_one`.
fn node_field(registry: &Arc<ModelRegistry>) -> Field {
    let registry = Arc::clone(registry);
    Field::new("node", TypeRef::named(NODE_INTERFACE), move |ctx| {
        let registry = Arc::clone(&registry);
        FieldFuture::new(async move {
            let encoded = ctx.args.try_get("id")?.string()?.to_string();
            let id = gid::decode(&encoded)?;
            let entity = registry
                .get(&id.type_name)
                .ok_or_else(|| OpError::Decode(format!("{encoded} (unknown type {})", id.type_name)))?;
            let pk = entity
                .primary_key()
                .ok_or_else(|| OpError::Validation(format!("{} has no primary key", id.type_name)))?;
            let mut filter = Record::new();
            filter.insert(pk.name.clone(), gid::coerce_key(&id.key));
            let store = ctx.data::<Arc<dyn Store>>()?;
            let found = store
                .find_one(&id.type_name, &filter)
                .await
                .map_err(OpError::from)?;
            Ok(found.map(|row| FieldValue::owned_any(row).with_type(id.type_name.clone())))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
}
