//! CLI error types.

use kc_federation::FederationError;
use kc_federation_ldap::LdapError;
use kc_storage::StorageError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Federation error (not found, policy violation, directory unavailable).
    #[error(transparent)]
    Federation(#[from] FederationError),

    /// Local store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<LdapError> for CliError {
    fn from(err: LdapError) -> Self {
        Self::Federation(err.into())
    }
}

impl CliError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Federation(FederationError::DirectoryUnavailable(_)) => 3,
            Self::Federation(FederationError::PolicyViolation(_)) => 4,
            Self::Config(_) | Self::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
