//! Federation error types.
//!
//! The caller-visible kinds are [`FederationError::NotFound`],
//! [`FederationError::PolicyViolation`] and
//! [`FederationError::DirectoryUnavailable`]. A member reference that
//! points at no directory entry is not an error at this level: resolvers
//! report it as a skipped reference instead.

use thiserror::Error;

/// Errors that can occur during federation operations.
#[derive(Debug, Error)]
pub enum FederationError {
    /// A named user or group does not exist.
    #[error("{entity} not found: {name}")]
    NotFound {
        /// Kind of entity ("User", "Group").
        entity: &'static str,
        /// Name or path that was looked up.
        name: String,
    },

    /// The mapper mode forbids the requested operation.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// The directory could not be reached or refused the operation.
    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Synchronization error (e.g. an inconsistent directory hierarchy).
    #[error("Synchronization error: {0}")]
    Sync(String),

    /// Protocol error (e.g., unexpected LDAP result).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal error.
    #[error("Internal federation error: {0}")]
    Internal(String),

    /// Local store error.
    #[error("Storage error: {0}")]
    Storage(#[from] kc_storage::StorageError),
}

impl FederationError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a not found error for a user.
    #[must_use]
    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "User",
            name: username.into(),
        }
    }

    /// Creates a not found error for a group.
    #[must_use]
    pub fn group_not_found(path: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Group",
            name: path.into(),
        }
    }

    /// Creates a policy violation error.
    #[must_use]
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// Creates a directory unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DirectoryUnavailable(msg.into())
    }

    /// Creates a synchronization error.
    #[must_use]
    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    /// Checks if this is a not found error (including a store miss).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Checks if this is a policy violation.
    #[must_use]
    pub const fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation(_))
    }

    /// Checks if the directory could not be reached.
    #[must_use]
    pub const fn is_directory_unavailable(&self) -> bool {
        matches!(self, Self::DirectoryUnavailable(_))
    }
}

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kc_storage::{EntityKind, StorageError};
    use uuid::Uuid;

    #[test]
    fn error_categories() {
        assert!(FederationError::user_not_found("jdoe").is_not_found());
        assert!(FederationError::group_not_found("/group1").is_not_found());
        assert!(FederationError::policy("read-only").is_policy_violation());
        assert!(FederationError::unavailable("refused").is_directory_unavailable());
        assert!(!FederationError::sync("cycle").is_not_found());
    }

    #[test]
    fn storage_not_found_counts_as_not_found() {
        let err: FederationError = StorageError::group_not_found(Uuid::now_v7()).into();
        assert!(err.is_not_found());

        let err: FederationError = StorageError::duplicate(EntityKind::Group, "name", "g").into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn messages_name_the_entity() {
        let err = FederationError::group_not_found("/Team 2016/2017");
        assert_eq!(err.to_string(), "Group not found: /Team 2016/2017");
    }
}
