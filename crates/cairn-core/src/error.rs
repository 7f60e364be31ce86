//! Error types for the cairn library.

use std::path::PathBuf;

use thiserror::Error;

/// Comprehensive error type for all cairn operations.
#[derive(Error, Debug)]
pub enum CairnError {
    /// Database connection, query or transaction errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Workflow not found for the given ID
    #[error("Workflow with ID {id} not found")]
    WorkflowNotFound { id: u64 },
    /// Goal not found for the given ID
    #[error("Goal with ID {id} not found")]
    GoalNotFound { id: u64 },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: u64 },
    /// Plan step not found for the given ID
    #[error("Step with ID {id} not found")]
    StepNotFound { id: u64 },
    /// Graph entity not found for the given ID
    #[error("Entity '{id}' not found")]
    EntityNotFound { id: String },
    /// A value outside of a closed enumeration (phase, status, ...)
    #[error("Invalid value '{value}' for {field}; expected one of: {allowed}")]
    InvalidEnum {
        field: String,
        value: String,
        allowed: String,
    },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// A relationship whose endpoint kinds are not allowed for its type
    #[error("Relationship {rel_type} is not allowed from {from_kind} to {to_kind}")]
    InvalidRelationship {
        rel_type: String,
        from_kind: String,
        to_kind: String,
    },
    /// Malformed stored data or input file contents
    #[error("Validation error: {message}")]
    Validation { message: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Source parsing errors
    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// A deadline-bounded operation ran out of time
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },
    /// No embedding backend is configured or it failed to initialize
    #[error("Embedder unavailable: {reason}")]
    EmbedderUnavailable { reason: String },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> CairnError {
        CairnError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> CairnError {
        CairnError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl CairnError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates an error for a value outside of a closed enumeration.
    pub fn invalid_enum(field: &str, value: &str, allowed: &[&str]) -> Self {
        Self::InvalidEnum {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.join(", "),
        }
    }

    /// Creates a validation error for malformed data.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether this error means "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound { .. }
                | Self::GoalNotFound { .. }
                | Self::PlanNotFound { .. }
                | Self::StepNotFound { .. }
                | Self::EntityNotFound { .. }
        )
    }

    pub(crate) fn join_error(e: tokio::task::JoinError) -> Self {
        Self::Configuration {
            message: format!("Task join error: {e}"),
        }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| CairnError::database(message).with_source(e))
    }
}

/// Result type alias for cairn operations
pub type Result<T> = std::result::Result<T, CairnError>;
