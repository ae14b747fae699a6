pub mod config;
pub mod error;
pub mod guard;

pub use config::{ConstraintSource, EngineConfig};
pub use error::EngineError;

use std::sync::Arc;

use libris_core::{
    ConflictClassification, ConflictFields, ConstraintManifest, ConstraintRegistry, MutationId,
    MutationResult, PendingMutation, Record, RecordFields,
};
use libris_storage::{SqliteStorage, Storage, StorageError};
use tracing::{debug, error, info, warn};

/// What a create mutation hands back: the result variant plus the
/// correlation ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePayload {
    pub mutation_id: MutationId,
    /// Echoed unchanged from the request.
    pub client_mutation_id: Option<String>,
    pub result: MutationResult,
}

impl CreatePayload {
    /// The created record, or `None` when the insert conflicted.
    pub fn record(&self) -> Option<&Record> {
        self.result.record()
    }
}

pub struct Engine {
    storage: SqliteStorage,
    registry: Arc<ConstraintRegistry>,
}

impl Engine {
    /// Opens the database and builds the constraint registry. A manifest that
    /// fails validation is fatal.
    pub fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let storage = if config.is_in_memory() {
            SqliteStorage::open_in_memory()?
        } else {
            SqliteStorage::open(&config.database)?
        };

        let manifest = match config.constraint_source() {
            ConstraintSource::Introspect => storage.introspect()?,
            ConstraintSource::Manifest(path) => {
                ConstraintManifest::from_file(&path).map_err(EngineError::Registry)?
            }
        };
        let registry = ConstraintRegistry::build(&manifest).map_err(EngineError::Registry)?;
        info!(
            target: "libris::engine",
            database = %config.database,
            constraints = registry.len(),
            fingerprint = %registry.fingerprint_hex(),
            "Constraint registry built"
        );

        Ok(Self::with_registry(storage, Arc::new(registry)))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::open(&EngineConfig::in_memory())
    }

    /// Engines on other connections may share one registry.
    pub fn with_registry(storage: SqliteStorage, registry: Arc<ConstraintRegistry>) -> Self {
        Self { storage, registry }
    }

    pub fn registry(&self) -> &Arc<ConstraintRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn classify(&self, error: &StorageError) -> ConflictClassification {
        guard::classify_failure(&self.registry, error)
    }

    // ========================================================================
    // Create Mutations
    // ========================================================================

    /// Inserts one row into `entity` and resolves the outcome into the
    /// entity's result union. Recognized conflicts come back as `Ok`; every
    /// other failure is returned as `EngineError::Storage` unchanged.
    pub fn create(
        &mut self,
        entity: &str,
        input: &Record,
        client_mutation_id: Option<&str>,
    ) -> Result<CreatePayload, EngineError> {
        let mutation_id = MutationId::new();
        let pending = PendingMutation::new(&self.registry, entity)?;
        let outcome = guard::attempt_insert(&mut self.storage, entity, input);

        let result = match pending.resolve(outcome, input, StorageError::raw_error) {
            Ok(result) => result,
            Err(e) => {
                error!(
                    target: "libris::engine",
                    mutation_id = %mutation_id,
                    entity,
                    code = ?e.raw_error().map(|raw| raw.code.as_str()),
                    constraint = ?e.raw_error().and_then(|raw| raw.constraint.as_deref()),
                    error = %e,
                    "Create failed"
                );
                return Err(e.into());
            }
        };

        match result.conflict() {
            Some(conflict) => warn!(
                target: "libris::engine",
                mutation_id = %mutation_id,
                entity,
                code = %conflict.code,
                constraint = %conflict.constraint_name,
                typename = %conflict.identity,
                "Create conflicted"
            ),
            None => debug!(
                target: "libris::engine",
                mutation_id = %mutation_id,
                entity,
                typename = %result.typename(),
                "Create succeeded"
            ),
        }

        Ok(CreatePayload {
            mutation_id,
            client_mutation_id: client_mutation_id.map(str::to_string),
            result,
        })
    }

    // ========================================================================
    // Typed Commands
    // ========================================================================

    pub fn create_book(&mut self, isbn: &str, title: &str) -> Result<CreatePayload, EngineError> {
        let input = Record::new().with("isbn", isbn).with("title", title);
        self.create("books", &input, None)
    }

    pub fn create_author(&mut self, name: &str) -> Result<CreatePayload, EngineError> {
        self.create("authors", &Record::new().with("name", name), None)
    }

    /// Credits an author on a book.
    pub fn add_book_author(
        &mut self,
        book_isbn: &str,
        author_id: i64,
    ) -> Result<CreatePayload, EngineError> {
        let input = Record::new()
            .with("book_isbn", book_isbn)
            .with("author_id", author_id);
        self.create("book_authors", &input, None)
    }

    pub fn register_user(
        &mut self,
        username: &str,
        email: &str,
        bio: Option<&str>,
    ) -> Result<CreatePayload, EngineError> {
        let input = Record::new()
            .with("username", username)
            .with("email", email)
            .with("bio", bio);
        self.create("users", &input, None)
    }
}
