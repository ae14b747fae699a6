use libris_core::{ConflictClassification, ConstraintRegistry, Record, WriteAttemptOutcome};
use libris_storage::{Storage, StorageError};

/// Performs exactly one insert and captures its failure as a value.
pub fn attempt_insert<S>(
    storage: &mut S,
    entity: &str,
    input: &Record,
) -> WriteAttemptOutcome<StorageError>
where
    S: Storage + ?Sized,
{
    storage.insert(entity, input).into()
}

/// Classifies a storage failure, looking through one transaction envelope.
pub fn classify_failure(registry: &ConstraintRegistry, error: &StorageError) -> ConflictClassification {
    match error.raw_error() {
        Some(raw) => registry.classify(raw),
        None => ConflictClassification::Unrecognized,
    }
}
