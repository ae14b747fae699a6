//! Decides whether a store failure is a recognized insert conflict.

use crate::{
    ids::VariantIdentity,
    raw_error::{RawError, sqlstate},
    registry::ConstraintRegistry,
};

/// A uniqueness or primary-key violation on a registered constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub identity: VariantIdentity,
    pub entity: String,
    pub constraint_name: String,
    pub columns: Vec<String>,
    pub message: String,
    pub code: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictClassification {
    /// Must propagate to the caller as an ordinary failure.
    Unrecognized,
    Recognized(Conflict),
}

impl ConflictClassification {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized(_))
    }
}

/// Only `23505` on a registered constraint is recognized. CHECK, NOT NULL,
/// foreign-key and the rest of the integrity class indicate bad input and
/// always propagate, as do unnamed or unmapped constraints.
pub fn classify(raw: &RawError, registry: &ConstraintRegistry) -> ConflictClassification {
    if !raw.is_integrity_violation() || raw.code != sqlstate::UNIQUE_VIOLATION {
        return ConflictClassification::Unrecognized;
    }
    let Some(name) = raw.constraint.as_deref() else {
        return ConflictClassification::Unrecognized;
    };
    let Some(registered) = registry.lookup(name) else {
        return ConflictClassification::Unrecognized;
    };

    let descriptor = &registered.descriptor;
    let message = match &raw.detail {
        Some(detail) => detail.clone(),
        None => {
            let type_name = registry
                .entity(&descriptor.entity)
                .map_or(descriptor.entity.as_str(), |e| e.names.type_name.as_str());
            format!("Insert into '{type_name}' violated constraint '{name}'")
        }
    };

    ConflictClassification::Recognized(Conflict {
        identity: registered.identity.clone(),
        entity: descriptor.entity.clone(),
        constraint_name: name.to_string(),
        columns: descriptor.columns.clone(),
        message,
        code: raw.code.clone(),
        detail: raw.detail.clone(),
    })
}
