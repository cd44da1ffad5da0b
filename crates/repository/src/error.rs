//! Error types for the repository engine.
//!
//! Errors are grouped by concern (entity state, constraints, queries,
//! transactions, concurrency, backend, configuration) and composed into the
//! top-level [`RepositoryError`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::core::transaction::Propagation;

/// The primary error type for all repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Entity state errors
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Constraint violations
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// Query model and compilation errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Transaction propagation errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Concurrency and versioning errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A storage failure wrapped with the operation that raised it.
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors related to entity state.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The entity targeted by an update or remove does not exist.
    #[error("entity not found: {entity_type}/{id}")]
    NotFound { entity_type: String, id: i64 },

    /// A single-result find matched no rows.
    #[error("no result found for {entity_type}")]
    NoResult { entity_type: String },
}

/// Errors raised by constraint validators.
#[derive(Error, Debug)]
pub enum ConstraintError {
    /// Another row already holds the values of a uniqueness group.
    #[error("duplicate {entity_type} for unique columns [{}]", columns.join(", "))]
    DuplicateEntity {
        entity_type: String,
        columns: Vec<String>,
    },

    /// A validator rejected the entity for another reason.
    #[error("constraint violated on {entity_type}: {message}")]
    Violated { entity_type: String, message: String },
}

/// Errors related to query parsing and predicate compilation.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Filter text could not be parsed.
    #[error("malformed filter: {filter}")]
    Malformed { filter: String },

    /// A field path does not resolve against the entity schema.
    #[error("unknown field '{path}' on {entity_type}")]
    UnknownField { entity_type: String, path: String },

    /// The field's declared type cannot be coerced from a literal.
    #[error("unsupported field type {field_type} for field '{field}'")]
    UnsupportedFieldType { field: String, field_type: String },

    /// Operands of an operation have the wrong shape.
    #[error("invalid operands: {message}")]
    InvalidOperands { message: String },

    /// A literal could not be converted to the target type.
    #[error("invalid literal '{literal}' for {target}")]
    InvalidLiteral { literal: String, target: String },
}

/// Errors related to transaction propagation.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The propagation contract was violated.
    #[error("illegal transaction state for {propagation}: {message}")]
    IllegalState {
        propagation: Propagation,
        message: String,
    },

    /// The adapter cannot suspend an active transaction.
    #[error("transaction suspension not supported for {propagation}")]
    SuspensionNotSupported { propagation: Propagation },

    /// The active transaction holds uncommitted writes that the backend
    /// cannot keep isolated from a second connection.
    #[error("cannot suspend a transaction holding uncommitted writes for {propagation}")]
    SuspensionBlocked { propagation: Propagation },

    /// Commit or rollback was requested without an active transaction.
    #[error("no active transaction")]
    NotActive,
}

/// Errors related to concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The stored version no longer matches the version being written.
    #[error("version conflict on {entity_type}/{id}: expected version {expected_version}")]
    VersionConflict {
        entity_type: String,
        id: i64,
        expected_version: i32,
    },
}

/// Backend-specific errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Query execution failed.
    #[error("query failed on {backend_name}: {message}")]
    QueryFailed {
        backend_name: String,
        message: String,
    },

    /// A stored value could not be converted to or from an entity field.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// A table or column name is not a safe identifier.
    #[error("invalid identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid identifier pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Wraps a failure raised while executing `operation`.
    pub fn generic(operation: &str, err: RepositoryError) -> Self {
        RepositoryError::Generic {
            message: format!("generic error while executing {operation}: {err}"),
            source: Some(Box::new(err)),
        }
    }

    /// Returns true if this is a single-result find with zero rows.
    pub fn is_no_result(&self) -> bool {
        matches!(self, RepositoryError::Entity(EntityError::NoResult { .. }))
    }

    /// Returns true if this is an update/remove of a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::Entity(EntityError::NotFound { .. }))
    }

    /// Returns true if a uniqueness group was violated.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::Constraint(ConstraintError::DuplicateEntity { .. })
        )
    }

    /// Returns true if a propagation contract was violated.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            RepositoryError::Transaction(
                TransactionError::IllegalState { .. }
                    | TransactionError::SuspensionNotSupported { .. }
                    | TransactionError::SuspensionBlocked { .. }
            )
        )
    }

    /// Returns true for argument errors raised while building predicates.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, RepositoryError::Query(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Backend(err.into())
    }
}
