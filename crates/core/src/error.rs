use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unsupported manifest version {found} (expected {expected})")]
    UnsupportedManifestVersion { found: u32, expected: u32 },

    #[error("duplicate constraint: {0}")]
    DuplicateConstraint(String),

    #[error("constraint {constraint} references unknown entity {entity}")]
    UnknownEntity { constraint: String, entity: String },

    #[error("constraint {constraint} references unknown column {entity}.{column}")]
    UnknownColumn {
        constraint: String,
        entity: String,
        column: String,
    },

    #[error("constraint {constraint} covers generated column {entity}.{column}")]
    GeneratedColumn {
        constraint: String,
        entity: String,
        column: String,
    },

    #[error("constraints {first} and {second} both resolve to variant {identity}")]
    IdentityCollision {
        identity: String,
        first: String,
        second: String,
    },
}
