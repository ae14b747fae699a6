//! Create-mutation outcomes and the discriminated result handed to the
//! resolution layer.

use crate::{
    classify::{Conflict, ConflictClassification},
    error::CoreError,
    field_value::FieldValue,
    ids::VariantIdentity,
    inflect::camel_case,
    raw_error::RawError,
    record::Record,
    registry::{ConstraintRegistry, RegisteredEntity},
};

/// Outcome of exactly one write, with the failure held as a value.
#[derive(Debug)]
pub enum WriteAttemptOutcome<E> {
    Success { record: Record },
    Failure { error: E },
}

impl<E> From<Result<Record, E>> for WriteAttemptOutcome<E> {
    fn from(result: Result<Record, E>) -> Self {
        match result {
            Ok(record) => Self::Success { record },
            Err(error) => Self::Failure { error },
        }
    }
}

impl<E> WriteAttemptOutcome<E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One member of an entity's create-result union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationResult {
    Created {
        identity: VariantIdentity,
        record: Record,
    },
    Conflict {
        conflict: Conflict,
        /// The attempted values for the constraint's columns.
        values: Record,
    },
}

/// Access to the created row. Conflict variants have no record.
pub trait RecordFields {
    fn record(&self) -> Option<&Record>;

    fn field(&self, column: &str) -> Option<&FieldValue> {
        self.record().and_then(|r| r.get(column))
    }
}

/// Access to conflict details. The created variant has none.
pub trait ConflictFields {
    fn conflict(&self) -> Option<&Conflict>;

    fn message(&self) -> Option<&str> {
        self.conflict().map(|c| c.message.as_str())
    }

    fn constraint_name(&self) -> Option<&str> {
        self.conflict().map(|c| c.constraint_name.as_str())
    }

    fn code(&self) -> Option<&str> {
        self.conflict().map(|c| c.code.as_str())
    }

    fn detail(&self) -> Option<&str> {
        self.conflict().and_then(|c| c.detail.as_deref())
    }
}

impl RecordFields for MutationResult {
    fn record(&self) -> Option<&Record> {
        match self {
            Self::Created { record, .. } => Some(record),
            Self::Conflict { .. } => None,
        }
    }
}

impl ConflictFields for MutationResult {
    fn conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Created { .. } => None,
            Self::Conflict { conflict, .. } => Some(conflict),
        }
    }
}

impl MutationResult {
    /// The discriminator.
    pub fn typename(&self) -> &VariantIdentity {
        match self {
            Self::Created { identity, .. } => identity,
            Self::Conflict { conflict, .. } => &conflict.identity,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Answers one field request against the active variant. Columns may be
    /// requested by store name (`created_at`) or camel case (`createdAt`).
    /// Returns `None` for fields the variant does not declare.
    pub fn resolve_field(&self, name: &str) -> Option<FieldValue> {
        if name == "__typename" {
            return Some(FieldValue::Text(self.typename().to_string()));
        }
        match self {
            Self::Created { record, .. } => column(record, name).cloned(),
            Self::Conflict { conflict, values } => match name {
                "message" => Some(FieldValue::Text(conflict.message.clone())),
                "constraint" | "constraintName" => {
                    Some(FieldValue::Text(conflict.constraint_name.clone()))
                }
                "code" => Some(FieldValue::Text(conflict.code.clone())),
                "detail" => Some(conflict.detail.clone().into()),
                other => column(values, other).cloned(),
            },
        }
    }
}

fn column<'a>(record: &'a Record, name: &str) -> Option<&'a FieldValue> {
    record
        .get(name)
        .or_else(|| record.iter().find(|(c, _)| camel_case(c) == name).map(|(_, v)| v))
}

/// A create mutation that has not been attempted yet. Consumed by
/// [`PendingMutation::resolve`], so each invocation resolves exactly once.
#[derive(Debug)]
pub struct PendingMutation<'r> {
    registry: &'r ConstraintRegistry,
    entity: &'r RegisteredEntity,
}

impl<'r> PendingMutation<'r> {
    pub fn new(registry: &'r ConstraintRegistry, entity: &str) -> Result<Self, CoreError> {
        let entity = registry
            .entity(entity)
            .ok_or_else(|| CoreError::InvalidData(format!("entity not registered: {entity}")))?;
        Ok(Self { registry, entity })
    }

    pub fn entity(&self) -> &RegisteredEntity {
        self.entity
    }

    /// Turns an outcome into a result variant. `raw_error` extracts the store
    /// error the classifier inspects, or `None` when the failure carries none.
    /// Failures that do not classify as a conflict on this entity are handed
    /// back unchanged.
    pub fn resolve<E, F>(
        self,
        outcome: WriteAttemptOutcome<E>,
        input: &Record,
        raw_error: F,
    ) -> Result<MutationResult, E>
    where
        F: FnOnce(&E) -> Option<&RawError>,
    {
        let error = match outcome {
            WriteAttemptOutcome::Success { record } => {
                return Ok(MutationResult::Created {
                    identity: self.entity.identity.clone(),
                    record,
                });
            }
            WriteAttemptOutcome::Failure { error } => error,
        };

        let classification = match raw_error(&error) {
            Some(raw) => self.registry.classify(raw),
            None => ConflictClassification::Unrecognized,
        };
        match classification {
            // A conflict on another entity's constraint (e.g. raised by a
            // trigger) is not a member of this union.
            ConflictClassification::Recognized(conflict)
                if conflict.entity == self.entity.names.table =>
            {
                let values = conflict
                    .columns
                    .iter()
                    .filter_map(|c| input.get(c).map(|v| (c.clone(), v.clone())))
                    .collect();
                Ok(MutationResult::Conflict { conflict, values })
            }
            _ => Err(error),
        }
    }
}
