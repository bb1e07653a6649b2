//! Entity GraphQL: association-aware schema synthesis for relational entity
//! models. Builds a complete typed query/mutation surface (object types,
//! paginated connections, nested creates, dialect-aware batch updates) over
//! a caller-supplied storage collaborator.

pub mod collapse;
pub mod error;
pub mod gid;
pub mod model;
pub mod naming;
pub mod schema;
pub mod sql;
pub mod store;

pub use error::{ModelError, OpError, StoreError};
pub use model::{
    AssocIndex, AttributeDescriptor, AttributeKind, EntityDescriptor, ModelRegistry,
    RelationshipDescriptor, RelationshipKind,
};
pub use schema::{build_schema, SchemaOptions};
pub use sql::Dialect;
pub use store::{AttachNode, AttachSpec, FindOptions, IncludeRef, Record, RelatedRow, Store};
