//! Engine configuration via `libris.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Config file name looked up by callers that keep one next to the database.
pub const CONFIG_FILE_NAME: &str = "libris.toml";

/// Overrides `database` when set.
pub const DATABASE_ENV: &str = "LIBRIS_DATABASE";

pub const IN_MEMORY: &str = ":memory:";

const INTROSPECT: &str = "introspect";

/// Where the constraint registry is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintSource {
    /// Read primary-key and unique constraints from the database catalogue.
    Introspect,
    /// Load a TOML constraint manifest.
    Manifest(PathBuf),
}

/// Engine configuration loaded from `libris.toml`.
///
/// # Example
///
/// ```toml
/// # Path to the SQLite database, or ":memory:"
/// database = "library.db"
///
/// # "introspect" (default) or the path of a constraint manifest
/// constraints = "constraints.toml"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_constraints")]
    pub constraints: String,
}

fn default_database() -> String {
    IN_MEMORY.to_string()
}

fn default_constraints() -> String {
    INTROSPECT.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            constraints: default_constraints(),
        }
    }
}

impl EngineConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_manifest(mut self, path: &Path) -> Self {
        self.constraints = path.display().to_string();
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }

    pub fn constraint_source(&self) -> ConstraintSource {
        match self.constraints.as_str() {
            INTROSPECT | "" => ConstraintSource::Introspect,
            path => ConstraintSource::Manifest(PathBuf::from(path)),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))
    }

    /// Reads a config file. Relative database and manifest paths are taken
    /// relative to the file's directory, then `LIBRIS_DATABASE` is applied.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| {
            EngineError::Config(format!(
                "failed to parse config file '{}': {e}",
                path.display()
            ))
        })?;
        if let Some(dir) = path.parent() {
            config.resolve_relative_to(dir);
        }
        config.apply_database_override(std::env::var(DATABASE_ENV).ok());
        Ok(config)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        if !self.is_in_memory() && Path::new(&self.database).is_relative() {
            self.database = dir.join(&self.database).display().to_string();
        }
        if let ConstraintSource::Manifest(manifest) = self.constraint_source()
            && manifest.is_relative()
        {
            self.constraints = dir.join(manifest).display().to_string();
        }
    }

    pub fn apply_database_override(&mut self, database: Option<String>) {
        if let Some(database) = database.filter(|d| !d.is_empty()) {
            self.database = database;
        }
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("failed to serialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_in_memory_introspection() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert!(config.is_in_memory());
        assert_eq!(config.constraint_source(), ConstraintSource::Introspect);
    }

    #[test]
    fn parses_manifest_source() {
        let config = EngineConfig::from_toml_str(
            r#"
database = "/var/lib/libris/library.db"
constraints = "/etc/libris/constraints.toml"
"#,
        )
        .unwrap();
        assert_eq!(config.database, "/var/lib/libris/library.db");
        assert_eq!(
            config.constraint_source(),
            ConstraintSource::Manifest(PathBuf::from("/etc/libris/constraints.toml"))
        );
    }

    #[test]
    fn rejects_malformed_config() {
        let err = EngineConfig::from_toml_str("database = 3").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "database = \"library.db\"\nconstraints = \"constraints.toml\"\n",
        )
        .unwrap();

        let mut config = EngineConfig::from_file(&path).unwrap();
        // Undo a possible override from the environment running the tests.
        config.apply_database_override(Some(dir.path().join("library.db").display().to_string()));
        assert_eq!(config.database, dir.path().join("library.db").display().to_string());
        assert_eq!(
            config.constraint_source(),
            ConstraintSource::Manifest(dir.path().join("constraints.toml"))
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn database_override() {
        let mut config = EngineConfig::default();
        config.apply_database_override(None);
        assert!(config.is_in_memory());
        config.apply_database_override(Some(String::new()));
        assert!(config.is_in_memory());
        config.apply_database_override(Some("other.db".into()));
        assert_eq!(config.database, "other.db");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EngineConfig::in_memory().with_database("library.db");
        let parsed = EngineConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
