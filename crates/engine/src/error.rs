use libris_core::CoreError;
use libris_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A store failure that is not a recognized conflict, passed through as is.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(String),

    /// The constraint metadata could not be loaded or validated.
    #[error("constraint registry error: {0}")]
    Registry(CoreError),
}

impl EngineError {
    /// The storage error behind an unrecognized failure.
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}
