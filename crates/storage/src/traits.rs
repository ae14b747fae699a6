use libris_core::{ConstraintManifest, FieldValue, Record};

use crate::error::StorageError;

/// Column as declared in the store catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub decl_type: String,
    pub has_default: bool,
    /// 1-based position within the primary key, 0 if not part of it.
    pub pk: i32,
}

/// A unique index backing a primary-key or unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    /// Name of the constraint as reported to callers.
    pub constraint: String,
    pub primary_key: bool,
    pub columns: Vec<String>,
}

pub trait Storage {
    /// Inserts one row and returns it as stored, including store-generated
    /// columns. Performs exactly one statement; never retries.
    fn insert(&mut self, entity: &str, values: &Record) -> Result<Record, StorageError>;

    fn find_by(
        &self,
        entity: &str,
        column: &str,
        value: &FieldValue,
    ) -> Result<Option<Record>, StorageError>;

    fn count(&self, entity: &str) -> Result<u64, StorageError>;

    fn columns(&self, entity: &str) -> Result<Vec<TableColumn>, StorageError>;

    fn unique_indexes(&self, entity: &str) -> Result<Vec<UniqueIndex>, StorageError>;

    /// Entities and their primary-key/unique constraints, with constraints on
    /// store-generated columns left out.
    fn introspect(&self) -> Result<ConstraintManifest, StorageError>;
}
