//! Constraint metadata consumed by the registry builder.
//!
//! A manifest is either produced by store introspection or loaded from a
//! versioned TOML file:
//!
//! ```toml
//! version = 1
//!
//! [[entities]]
//! name = "users"
//! columns = [
//!     { name = "id", generated = true },
//!     { name = "username" },
//!     { name = "email" },
//! ]
//!
//! [[constraints]]
//! name = "unique_user_username"
//! entity = "users"
//! columns = ["username"]
//! kind = "unique"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "primary_key",
            Self::Unique => "unique",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub entity: String,
    pub columns: Vec<String>,
    pub kind: ConstraintKind,
    /// Overrides the derived variant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl ConstraintDescriptor {
    pub fn new(name: &str, entity: &str, columns: &[&str], kind: ConstraintKind) -> Self {
        Self {
            name: name.to_string(),
            entity: entity.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = Some(identity.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Filled in by the store (identity keys, defaulted timestamps); never
    /// supplied by a caller.
    #[serde(default)]
    pub generated: bool,
}

impl ColumnDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            generated: false,
        }
    }

    pub fn generated(name: &str) -> Self {
        Self {
            name: name.to_string(),
            generated: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            type_name: None,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintManifest {
    pub version: u32,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
}

impl Default for ConstraintManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entities: Vec::new(),
            constraints: Vec::new(),
        }
    }
}

impl ConstraintManifest {
    pub fn new(entities: Vec<EntityDescriptor>, constraints: Vec<ConstraintDescriptor>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            entities,
            constraints,
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        toml::from_str(s).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InvalidData(format!(
                "failed to read constraint manifest '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
