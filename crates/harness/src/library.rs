use libris_core::{ConstraintManifest, FieldValue, Record};
use libris_engine::{CreatePayload, Engine, EngineConfig, EngineError};
use libris_storage::Storage;
use tempfile::TempDir;

/// An engine over a fresh in-memory library database.
pub struct TestLibrary {
    pub engine: Engine,
    // Holds the manifest file, if any, for the library's lifetime.
    _dir: Option<TempDir>,
}

impl TestLibrary {
    /// Constraints come from introspecting the schema.
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open_in_memory()?,
            _dir: None,
        })
    }

    /// Constraints come from `manifest`, written out as a TOML file first.
    pub fn with_manifest(manifest: &ConstraintManifest) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("constraints.toml");
        std::fs::write(&path, manifest.to_toml_string()?)?;
        let engine = Engine::open(&EngineConfig::in_memory().with_manifest(&path))?;
        Ok(Self {
            engine,
            _dir: Some(dir),
        })
    }

    pub fn create(
        &mut self,
        entity: &str,
        fields: Vec<(&str, FieldValue)>,
    ) -> Result<CreatePayload, EngineError> {
        let input: Record = fields.into_iter().collect();
        self.engine.create(entity, &input, None)
    }

    pub fn count(&self, entity: &str) -> Result<u64, EngineError> {
        Ok(self.engine.storage().count(entity)?)
    }
}
