//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak sensitive information like
//! passwords, bind credentials, or internal LDAP structure.

use kc_federation::FederationError;
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Connection URL must use LDAPS.
    #[error("Security error: Only LDAPS is supported. URL must start with 'ldaps://'. STARTTLS and plain LDAP are not allowed.")]
    InsecureProtocol,

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// TLS/SSL error.
    #[error("LDAP TLS error: {0}")]
    Tls(String),

    /// Bind (authentication) failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// Modify operation failed.
    #[error("LDAP modify failed: {0}")]
    Modify(String),

    /// Invalid DN format.
    #[error("Invalid DN format: {0}")]
    InvalidDn(String),

    /// Timeout error.
    #[error("LDAP operation timed out")]
    Timeout,

    /// Pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Protocol error from LDAP server.
    #[error("LDAP protocol error: {0}")]
    Protocol(String),

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a TLS error.
    #[must_use]
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Tls(_)
                | Self::Bind(_)
                | Self::Timeout
                | Self::PoolExhausted
                | Self::Ldap3(_)
        )
    }

    /// Checks if this is a security-related error.
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(self, Self::InsecureProtocol | Self::Tls(_) | Self::Bind(_))
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for FederationError {
    fn from(err: LdapError) -> Self {
        if err.is_connection_error() {
            return FederationError::DirectoryUnavailable(err.to_string());
        }
        match err {
            LdapError::Configuration(msg) => FederationError::Configuration(msg),
            LdapError::InsecureProtocol => FederationError::Configuration(err.to_string()),
            LdapError::Search(msg) | LdapError::Modify(msg) | LdapError::Protocol(msg) => {
                FederationError::Protocol(msg)
            }
            LdapError::InvalidDn(msg) => FederationError::Protocol(format!("Invalid DN: {msg}")),
            other => FederationError::Internal(other.to_string()),
        }
    }
}
