//! Typed errors: synthesis-time failures abort the whole schema build,
//! per-request failures surface as one failed operation result.

use thiserror::Error;

/// Errors raised while validating descriptors or assembling the schema.
/// Any of these makes `build_schema` fail as a whole; there is no partial
/// schema.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown entity: '{0}'")]
    MissingEntity(String),
    #[error("entity '{entity}' references unknown attribute '{attribute}'")]
    MissingAttribute { entity: String, attribute: String },
    #[error("invalid primary key: entity {entity} attribute {attribute}")]
    InvalidPrimaryKey { entity: String, attribute: String },
    #[error("duplicate entity name: {0}")]
    DuplicateEntityName(String),
    #[error("type name '{0}' requested with two different shapes")]
    DuplicateTypeName(String),
    #[error("schema assembly: {0}")]
    Assemble(String),
}

/// Errors raised by a generated resolver at request time.
#[derive(Error, Debug)]
pub enum OpError {
    #[error("malformed global id: {0}")]
    Decode(String),
    #[error("batch update not implemented for dialect: {0}")]
    UnsupportedDialect(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}

/// Opaque failure from the storage collaborator. The synthesizer never
/// inspects it beyond passing the message through.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        StoreError(msg.into())
    }
}
