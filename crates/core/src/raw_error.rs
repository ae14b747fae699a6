use std::fmt;

/// SQLSTATE codes the classifier and the store adapter agree on.
pub mod sqlstate {
    /// Class prefix shared by every integrity constraint violation.
    pub const INTEGRITY_CLASS: &str = "23";

    pub const INTEGRITY_CONSTRAINT_VIOLATION: &str = "23000";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    /// Raised for both primary-key and unique constraints.
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const CHECK_VIOLATION: &str = "23514";

    pub fn is_integrity_violation(code: &str) -> bool {
        code.len() == 5 && code.starts_with(INTEGRITY_CLASS)
    }
}

/// Structured failure reported by the backing store for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub code: String,
    pub message: String,
    pub constraint: Option<String>,
    pub detail: Option<String>,
    pub table: Option<String>,
}

impl RawError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            constraint: None,
            detail: None,
            table: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn is_integrity_violation(&self) -> bool {
        sqlstate::is_integrity_violation(&self.code)
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(constraint) = &self.constraint {
            write!(f, " (constraint {constraint})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RawError {}
