//! Group storage provider trait.

use async_trait::async_trait;
use kc_model::{Group, GroupTree};
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for group storage operations.
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait GroupProvider: Send + Sync {
    /// Creates a new group.
    ///
    /// Sibling names need not be unique; path lookups pick the sibling
    /// created first.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the id is taken, and
    /// `StorageError::NotFound` if the parent doesn't exist.
    async fn create(&self, group: &Group) -> StorageResult<()>;

    /// Updates an existing group.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the group doesn't exist.
    async fn update(&self, group: &Group) -> StorageResult<()>;

    /// Deletes a group by ID, cascading to child groups and memberships.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the group doesn't exist.
    async fn delete(&self, realm_id: Uuid, id: Uuid) -> StorageResult<()>;

    /// Gets a group by ID.
    async fn get_by_id(&self, realm_id: Uuid, id: Uuid) -> StorageResult<Option<Group>>;

    /// Gets a group by path (e.g., `/parent/Team 2016/2017`).
    ///
    /// Names containing the separator are matched against existing
    /// structure, see [`GroupTree::resolve`].
    async fn get_by_path(&self, realm_id: Uuid, path: &str) -> StorageResult<Option<Group>>;

    /// Lists top-level groups in a realm, in creation order.
    async fn list_top_level(&self, realm_id: Uuid) -> StorageResult<Vec<Group>>;

    /// Lists child groups of a parent group, in creation order.
    async fn list_children(&self, realm_id: Uuid, parent_id: Uuid) -> StorageResult<Vec<Group>>;

    /// Returns a consistent snapshot of the realm's group hierarchy.
    async fn get_tree(&self, realm_id: Uuid) -> StorageResult<GroupTree>;

    /// Counts groups in a realm.
    async fn count(&self, realm_id: Uuid) -> StorageResult<u64>;

    /// Gets the full path of a group.
    async fn get_path(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<String>;
}
