pub mod classify;
pub mod constraint;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod inflect;
pub mod raw_error;
pub mod record;
pub mod registry;
pub mod result;

pub use classify::{Conflict, ConflictClassification};
pub use constraint::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, ConstraintManifest, EntityDescriptor,
};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use raw_error::{RawError, sqlstate};
pub use record::Record;
pub use registry::{ConstraintRegistry, RegisteredConstraint, RegisteredEntity};
pub use result::{
    ConflictFields, MutationResult, PendingMutation, RecordFields, WriteAttemptOutcome,
};
