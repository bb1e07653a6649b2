//! GraphQL schema synthesis: per-entity types, CRUD operations, and final
//! assembly.

mod build;
mod entity_type;
mod operations;
mod type_cache;

pub use build::{build_schema, SchemaOptions};
