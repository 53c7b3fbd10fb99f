//! Query error types
//!
//! Every failure the compiler can produce, kept deliberately specific:
//! each variant names the resource, field, or operator that caused it so
//! callers can map errors to responses without parsing message text.
//! Compilation errors are raised before any statement reaches storage.

use thiserror::Error;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised by the query compiler, catalogue loader, and executor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown resource: {resource}")]
    UnknownResource { resource: String },

    #[error("Field '{field}' is not declared by resource '{resource}'")]
    UnresolvedField { resource: String, field: String },

    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Unsupported operator '{operator}' on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFilterValue { field: String, reason: String },

    #[error("Too many values for field '{field}': {count} exceeds limit of {max}")]
    TooManyValues { field: String, count: usize, max: usize },

    #[error("Too many order fields: {count} exceeds limit of {max}")]
    TooManyOrderFields { count: usize, max: usize },

    #[error("Invalid order direction '{direction}' on field '{field}'")]
    InvalidDirection { field: String, direction: String },

    #[error("Invalid pagination: {reason}")]
    InvalidPagination { reason: String },

    #[error("Invalid payload for resource '{resource}': {reason}")]
    InvalidPayload { resource: String, reason: String },

    #[error("Missing tenant context for tenant-scoped resource '{resource}'")]
    MissingTenantContext { resource: String },

    #[error("Invalid resource definition '{resource}': {reason}")]
    InvalidDefinition { resource: String, reason: String },

    #[error("Storage execution failed: {message}")]
    Storage { message: String },
}

impl QueryError {
    /// Create an unknown resource error
    pub fn unknown_resource<T: Into<String>>(resource: T) -> Self {
        QueryError::UnknownResource {
            resource: resource.into(),
        }
    }

    /// Create an unresolved field error
    pub fn unresolved_field<R: Into<String>, F: Into<String>>(resource: R, field: F) -> Self {
        QueryError::UnresolvedField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier<I: Into<String>, R: Into<String>>(identifier: I, reason: R) -> Self {
        QueryError::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported operator error
    pub fn unsupported_operator<F: Into<String>, O: Into<String>>(field: F, operator: O) -> Self {
        QueryError::UnsupportedOperator {
            field: field.into(),
            operator: operator.into(),
        }
    }

    /// Create an invalid filter value error
    pub fn invalid_filter_value<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        QueryError::InvalidFilterValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid pagination error
    pub fn invalid_pagination<T: Into<String>>(reason: T) -> Self {
        QueryError::InvalidPagination {
            reason: reason.into(),
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload<R: Into<String>, M: Into<String>>(resource: R, reason: M) -> Self {
        QueryError::InvalidPayload {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing tenant context error
    pub fn missing_tenant_context<T: Into<String>>(resource: T) -> Self {
        QueryError::MissingTenantContext {
            resource: resource.into(),
        }
    }

    /// Create an invalid definition error
    pub fn invalid_definition<R: Into<String>, M: Into<String>>(resource: R, reason: M) -> Self {
        QueryError::InvalidDefinition {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage<T: Into<String>>(message: T) -> Self {
        QueryError::Storage {
            message: message.into(),
        }
    }

    /// Get error code for consistent API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::UnknownResource { .. } => "UNKNOWN_RESOURCE",
            QueryError::UnresolvedField { .. } => "UNRESOLVED_FIELD",
            QueryError::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            QueryError::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            QueryError::InvalidFilterValue { .. } => "INVALID_FILTER_VALUE",
            QueryError::TooManyValues { .. } => "TOO_MANY_VALUES",
            QueryError::TooManyOrderFields { .. } => "TOO_MANY_ORDER_FIELDS",
            QueryError::InvalidDirection { .. } => "INVALID_DIRECTION",
            QueryError::InvalidPagination { .. } => "INVALID_PAGINATION",
            QueryError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            QueryError::MissingTenantContext { .. } => "MISSING_TENANT_CONTEXT",
            QueryError::InvalidDefinition { .. } => "INVALID_DEFINITION",
            QueryError::Storage { .. } => "STORAGE_EXECUTION_FAILED",
        }
    }

    /// Whether the failure was caused by the request rather than the server.
    /// Client errors are safe to echo back; the rest get a generic message.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            QueryError::Storage { .. } | QueryError::InvalidDefinition { .. }
        )
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Storage {
            message: err.to_string(),
        }
    }
}
