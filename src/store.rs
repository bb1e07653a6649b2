//! The storage collaborator interface. The synthesizer never executes
//! queries itself; every generated resolver delegates here. Implementations
//! own query planning, transactions, and pooling.

use crate::error::StoreError;
use crate::sql::Dialect;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One row moving between resolvers and storage, keyed by attribute name.
pub type Record = Map<String, Value>;

/// Exact-match filter over attribute values.
pub type Filter = Map<String, Value>;

/// Relationship include re-targeted onto its actual target entity and alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeRef {
    pub entity: String,
    pub alias: String,
}

/// Options for list/count reads.
#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub filter: Filter,
    /// Disjunction of filters; when non-empty a row matches if ANY entry
    /// matches (used by batch-update read-back). `filter` still applies.
    pub any_of: Vec<Filter>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<String>,
    pub includes: Vec<IncludeRef>,
}

/// Eager-attach instruction set for a nested create: which declared
/// relationships to create alongside the root row, nested to any depth.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachSpec {
    pub include: Vec<AttachNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachNode {
    /// Relationship name as declared (and as keyed in the payload).
    pub relationship: String,
    /// Target entity to create rows in.
    pub target: String,
    /// Join entity for many-to-many relationships.
    pub through: Option<String>,
    pub foreign_key: String,
    pub include: Vec<AttachNode>,
}

/// One element of a to-many relationship read: the related node plus, for
/// many-to-many relationships, the join row carrying edge attributes.
#[derive(Clone, Debug)]
pub struct RelatedRow {
    pub node: Record,
    pub join: Option<Record>,
}

/// Everything the generated resolvers need from the relational backend.
/// Calls may run concurrently across and within requests; implementations
/// must be internally synchronized.
#[async_trait]
pub trait Store: Send + Sync {
    /// Dialect of the underlying engine, for raw script synthesis.
    fn dialect(&self) -> Dialect;

    async fn find_one(&self, entity: &str, filter: &Filter) -> Result<Option<Record>, StoreError>;

    async fn find_all(&self, entity: &str, options: &FindOptions) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, entity: &str, options: &FindOptions) -> Result<u64, StoreError>;

    /// Create one row; `attach` names the relationships whose nested payload
    /// rows must be created in the same operation.
    async fn create(
        &self,
        entity: &str,
        values: &Record,
        attach: &AttachSpec,
    ) -> Result<Record, StoreError>;

    async fn bulk_create(&self, entity: &str, rows: &[Record]) -> Result<Vec<Record>, StoreError>;

    /// Update matching rows, returning the affected count.
    async fn update(&self, entity: &str, values: &Record, filter: &Filter) -> Result<u64, StoreError>;

    /// Delete matching rows, returning the affected count.
    async fn destroy(&self, entity: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Execute a pre-assembled native script (batch update), returning the
    /// total affected-row count. Atomicity is the implementation's job.
    async fn raw_execute(&self, script: &str) -> Result<u64, StoreError>;

    /// Rows related to one parent row through a declared relationship.
    async fn related(
        &self,
        entity: &str,
        relationship: &str,
        parent_key: &Value,
    ) -> Result<Vec<RelatedRow>, StoreError>;

    /// Dedicated count accessor for one relationship of one parent row.
    async fn related_count(
        &self,
        entity: &str,
        relationship: &str,
        parent_key: &Value,
    ) -> Result<u64, StoreError>;
}
