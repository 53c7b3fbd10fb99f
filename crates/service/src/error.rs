//! Service error types
//!
//! Wraps compiler errors and adds the failures only the service layer
//! can produce: version gating, per-version resource availability, and
//! configuration problems. Storage failures are logged with the engine
//! text but surface with a generic public message.

use thiserror::Error;

use scopeq_query::QueryError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by the versioned API surface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Unsupported API version '{version}' (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    #[error("API version '{version}' was retired on {date}")]
    DeprecatedVersion { version: String, date: String },

    #[error("Resource '{resource}' is not available in API version '{version}'")]
    ResourceNotAvailable { resource: String, version: String },

    #[error("Feature '{feature}' is disabled in API version '{version}'")]
    FeatureDisabled { feature: String, version: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ServiceError {
    /// Create a not found error
    pub fn not_found<T: Into<String>>(what: T) -> Self {
        ServiceError::NotFound { what: what.into() }
    }

    /// Create a configuration error
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        ServiceError::Configuration {
            message: message.into(),
        }
    }

    /// Get error code for consistent API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            ServiceError::DeprecatedVersion { .. } => "VERSION_RETIRED",
            ServiceError::ResourceNotAvailable { .. } => "RESOURCE_NOT_AVAILABLE",
            ServiceError::FeatureDisabled { .. } => "FEATURE_DISABLED",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::Configuration { .. } => "CONFIGURATION_ERROR",
            ServiceError::Query(err) => err.error_code(),
        }
    }

    /// HTTP status an embedding transport should answer with
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::UnsupportedVersion { .. } => 400,
            ServiceError::DeprecatedVersion { .. } => 410,
            ServiceError::ResourceNotAvailable { .. } => 404,
            ServiceError::FeatureDisabled { .. } => 400,
            ServiceError::NotFound { .. } => 404,
            ServiceError::Configuration { .. } => 500,
            ServiceError::Query(err) => match err {
                QueryError::UnknownResource { .. } => 404,
                QueryError::MissingTenantContext { .. } => 401,
                _ if err.is_client_error() => 400,
                _ => 500,
            },
        }
    }

    /// Message safe to put in a response body. Engine failures keep their
    /// detail in the logs only.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Query(err) if !err.is_client_error() => {
                "Database query failed".to_string()
            }
            ServiceError::Configuration { .. } => "Service misconfigured".to_string(),
            other => other.to_string(),
        }
    }
}
