//! Storage error types.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Kind of stored entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A group.
    Group,
    /// A user.
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Group => "Group",
            Self::User => "User",
        })
    }
}

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No entity with this id in the realm.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Entity id.
        id: Uuid,
    },

    /// A unique field already holds this value.
    #[error("Duplicate {kind}: {field} '{value}' already exists")]
    Duplicate {
        /// Entity kind.
        kind: EntityKind,
        /// Field that caused the conflict.
        field: &'static str,
        /// Conflicting value.
        value: String,
    },

    /// The write would create a cycle in the group hierarchy.
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),
}

impl StorageError {
    /// Group `id` does not exist.
    #[must_use]
    pub const fn group_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Group,
            id,
        }
    }

    /// User `id` does not exist.
    #[must_use]
    pub const fn user_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::User,
            id,
        }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub fn duplicate(kind: EntityKind, field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            field,
            value: value.into(),
        }
    }

    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is a duplicate error.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
