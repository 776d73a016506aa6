//! Error taxonomy for scoring and remediation

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the scoring pipeline and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Missing page, chunk, volume or prior
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collaborator call failed
    #[error("Upstream failure in {service}: {message}")]
    Upstream { service: String, message: String },

    /// A collaborator call did not answer in time
    #[error("Upstream timeout in {service} after {timeout_ms}ms")]
    UpstreamTimeout { service: String, timeout_ms: u64 },

    /// Malformed caller input, rejected before any collaborator call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Programming error, e.g. sigma requested on an improper prior
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build an upstream failure for the named collaborator
    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code, returned to API callers
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Upstream { .. } => "upstream_failure",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::Validation(_) => "validation_failed",
            Self::Precondition(_) => "precondition_failed",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
