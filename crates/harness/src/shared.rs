use std::path::PathBuf;
use std::sync::Arc;

use libris_engine::{Engine, EngineConfig};
use libris_storage::SqliteStorage;
use tempfile::TempDir;

/// Several engines, one per connection, over a single database file and
/// sharing one constraint registry.
pub struct SharedLibrary {
    dir: TempDir,
    engines: Vec<Engine>,
}

impl SharedLibrary {
    pub fn new(connections: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("library.db");
        let path = path.to_str().ok_or("temp path is not UTF-8")?;

        let first = Engine::open(&EngineConfig::in_memory().with_database(path))?;
        let registry = Arc::clone(first.registry());
        let mut engines = vec![first];
        for _ in 1..connections {
            let storage = SqliteStorage::open(path)?;
            engines.push(Engine::with_registry(storage, Arc::clone(&registry)));
        }
        Ok(Self { dir, engines })
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("library.db")
    }

    pub fn engine(&mut self, index: usize) -> &mut Engine {
        &mut self.engines[index]
    }

    /// Hands the engines out, e.g. to move one into each thread. The database
    /// file lives as long as `self`.
    pub fn take_engines(&mut self) -> Vec<Engine> {
        std::mem::take(&mut self.engines)
    }
}
