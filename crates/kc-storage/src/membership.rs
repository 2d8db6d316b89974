//! Local membership store trait.
//!
//! Join and leave are idempotent: adding an existing edge or removing an
//! absent one is not an error. Whether a mutation is allowed at all is
//! decided by the caller (the federation mode policy), not by the store.

use async_trait::async_trait;
use kc_model::{Group, MembershipEdge, MembershipOrigin};
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for local group membership operations.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Adds a user to a group.
    ///
    /// Returns `true` if a new edge was stored, `false` if the user
    /// already was a member (the existing origin is kept).
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the user or group doesn't exist.
    async fn add_member(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
        origin: MembershipOrigin,
    ) -> StorageResult<bool>;

    /// Saves a group and adds membership edges to it in one step.
    ///
    /// The group is created if its id is unknown and replaced otherwise; a
    /// group equal to the stored one is not rewritten. Existing edges keep
    /// their origin. Concurrent readers see either none of the changes or
    /// all of them. Returns the number of new edges.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the parent group or one of the
    /// users doesn't exist. Nothing is written in that case.
    async fn save_group_with_members(
        &self,
        group: &Group,
        members: &[(Uuid, MembershipOrigin)],
    ) -> StorageResult<usize>;

    /// Removes a user from a group.
    ///
    /// Returns `true` if an edge was removed.
    async fn remove_member(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
    ) -> StorageResult<bool>;

    /// Gets the edge between a user and a group, if any.
    async fn get_membership(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
    ) -> StorageResult<Option<MembershipEdge>>;

    /// Lists the membership edges of a user, in insertion order.
    async fn get_user_memberships(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> StorageResult<Vec<MembershipEdge>>;

    /// Lists the membership edges of a group, in insertion order.
    async fn get_members(
        &self,
        realm_id: Uuid,
        group_id: Uuid,
        max_results: Option<usize>,
        offset: Option<usize>,
    ) -> StorageResult<Vec<MembershipEdge>>;

    /// Counts members in a group.
    async fn count_members(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<u64>;
}
