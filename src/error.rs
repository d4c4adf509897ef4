//! Error types for the Stratus deployment engine.
//!
//! This module provides the error hierarchy for the full deployment
//! lifecycle: configuration loading, graph construction, planning, and
//! provisioning through the cloud control-plane API.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Stratus deployment engine.
#[derive(Debug, Error)]
pub enum StratusError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resource graph construction errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Cloud control-plane API errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
///
/// These are plan-time errors: they are detected before any remote call is
/// made and abort the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The stack configuration file was not found.
    #[error("Stack file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The stack configuration file could not be parsed.
    #[error("Failed to parse stack file: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Stack validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required configuration value was not supplied.
    #[error("Missing required configuration value: {key}")]
    MissingConfiguration {
        /// Name of the missing key.
        key: String,
    },
}

/// Resource graph construction errors.
///
/// Like configuration errors these are plan-time and fatal: a malformed
/// graph never reaches the provider.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A resource name was declared twice within one deployment.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of the resource being declared.
        kind: String,
        /// The duplicated name.
        name: String,
    },

    /// The dependency edges form a cycle.
    #[error("Cyclic dependency detected: {cycle}")]
    CyclicDependency {
        /// The cycle members, in traversal order.
        cycle: String,
    },

    /// A referenced resource does not exist in this deployment.
    #[error("Unknown resource: {name}")]
    UnknownResource {
        /// Name of the missing resource.
        name: String,
    },

    /// A resource was replaced after its creation request had been issued.
    #[error("Resource '{name}' can no longer be replaced: creation already issued")]
    ResourceFrozen {
        /// Name of the frozen resource.
        name: String,
    },

    /// An export was read before its deferred value resolved.
    #[error("Export '{name}' is unresolved: execute the plan first")]
    UnresolvedExport {
        /// Name of the export.
        name: String,
    },
}

/// Cloud control-plane API errors.
///
/// These are apply-time errors. During execution they are attributed to the
/// resource whose operation raised them; dependents are skipped and
/// independent branches continue.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed.
    #[error("Provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Provider API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Provider API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from provider API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The named resource does not exist on the provider side.
    #[error("Resource not found on provider: {kind} '{name}'")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
    },

    /// A creation response lacked an output the graph depends on.
    #[error("Provider response for '{resource}' is missing output field '{field}'")]
    MissingOutput {
        /// The absent output field.
        field: String,
        /// Resource whose response was incomplete.
        resource: String,
    },
}

/// Result type alias for Stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;

impl StratusError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable at the client boundary.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(
                ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. }
            )
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::Provider(ProviderError::NetworkError { .. }) => Some(5),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-configuration error for the given key.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingConfiguration { key: key.into() }
    }
}

impl GraphError {
    /// Creates a duplicate-name error.
    #[must_use]
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a cyclic-dependency error from the member names.
    #[must_use]
    pub fn cycle(members: &[String]) -> Self {
        Self::CyclicDependency {
            cycle: members.join(" -> "),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
