use libris_core::RawError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A statement was rejected by the database with a structured error.
    #[error("database error: {0}")]
    Database(RawError),

    /// The surrounding transaction failed; wraps the failure it reported.
    #[error("transaction failed: {0}")]
    Transaction(Box<StorageError>),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown column: {entity}.{column}")]
    UnknownColumn { entity: String, column: String },

    /// The column is assigned by the store and cannot be written.
    #[error("generated column: {entity}.{column}")]
    GeneratedColumn { entity: String, column: String },

    #[error("core error: {0}")]
    Core(#[from] libris_core::CoreError),
}

impl StorageError {
    /// The store's structured error, looking through at most one transaction
    /// envelope. Deeper nesting is not produced by this crate and yields `None`.
    pub fn raw_error(&self) -> Option<&RawError> {
        match self {
            Self::Database(raw) => Some(raw),
            Self::Transaction(inner) => match inner.as_ref() {
                Self::Database(raw) => Some(raw),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::sqlstate;

    fn raw() -> RawError {
        RawError::new(sqlstate::UNIQUE_VIOLATION, "UNIQUE constraint failed: books.isbn")
            .with_constraint("books_pkey")
    }

    #[test]
    fn unwraps_one_envelope() {
        let direct = StorageError::Database(raw());
        assert_eq!(direct.raw_error(), Some(&raw()));

        let wrapped = StorageError::Transaction(Box::new(StorageError::Database(raw())));
        assert_eq!(wrapped.raw_error(), Some(&raw()));
    }

    #[test]
    fn deeper_nesting_is_opaque() {
        let nested = StorageError::Transaction(Box::new(StorageError::Transaction(Box::new(
            StorageError::Database(raw()),
        ))));
        assert_eq!(nested.raw_error(), None);
    }

    #[test]
    fn other_failures_carry_no_raw_error() {
        assert_eq!(StorageError::UnknownEntity("shelves".into()).raw_error(), None);
        assert_eq!(
            StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows).raw_error(),
            None
        );
    }
}
