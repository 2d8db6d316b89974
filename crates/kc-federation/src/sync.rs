//! Synchronization support for group federation.
//!
//! A sync pass walks the directory group tree, makes sure every directory
//! group has a local counterpart, and (depending on the mode) imports
//! membership edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FederationResult;

// ============================================================================
// Sync Results
// ============================================================================

/// Result of a synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Number of local groups created.
    pub added: usize,

    /// Number of local groups whose attributes or position changed.
    pub updated: usize,

    /// Number of local groups removed.
    pub removed: usize,

    /// Number of new local membership edges.
    pub memberships_imported: usize,

    /// Number of member references that resolved to no entry.
    pub dangling_skipped: usize,

    /// Number of groups that failed to sync.
    pub failed: usize,

    /// When the sync started.
    pub started_at: DateTime<Utc>,

    /// When the sync completed.
    pub completed_at: DateTime<Utc>,

    /// Status message.
    pub status: String,

    /// Errors encountered (if any).
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    /// Creates a new sync result.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            added: 0,
            updated: 0,
            removed: 0,
            memberships_imported: 0,
            dangling_skipped: 0,
            failed: 0,
            started_at,
            completed_at: Utc::now(),
            status: String::new(),
            errors: Vec::new(),
        }
    }

    /// Marks the sync as complete.
    #[must_use]
    pub fn complete(mut self) -> Self {
        self.completed_at = Utc::now();
        self.status = format!(
            "Sync of groups from LDAP to local store finished: {} imported groups, {} updated groups, {} removed groups, {} memberships imported",
            self.added, self.updated, self.removed, self.memberships_imported
        );
        self
    }

    /// Records a group addition.
    pub fn record_added(&mut self) {
        self.added += 1;
    }

    /// Records a group update.
    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    /// Records a group removal.
    pub fn record_removed(&mut self) {
        self.removed += 1;
    }

    /// Records a newly stored membership edge.
    pub fn record_membership(&mut self) {
        self.memberships_imported += 1;
    }

    /// Records a skipped dangling member reference.
    pub fn record_dangling(&mut self) {
        self.dangling_skipped += 1;
    }

    /// Records a sync failure.
    pub fn record_failure(&mut self, error: SyncError) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Returns the total number of groups processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.updated + self.removed + self.failed
    }

    /// Returns true if the sync had any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if the pass changed nothing locally.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0 && self.memberships_imported == 0
    }
}

/// Error encountered during sync for a specific directory group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    /// Directory DN of the group.
    pub dn: String,

    /// Group name (if available).
    pub group_name: Option<String>,

    /// Error message.
    pub message: String,
}

impl SyncError {
    /// Creates a new sync error.
    #[must_use]
    pub fn new(dn: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            group_name: None,
            message: message.into(),
        }
    }

    /// Sets the group name.
    #[must_use]
    pub fn with_group_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = Some(name.into());
        self
    }
}

// ============================================================================
// Group Synchronization Trait
// ============================================================================

/// Trait for mappers that can reconcile directory groups into the local store.
///
/// At most one pass per mapper may run at a time; callers hold the lock.
#[allow(async_fn_in_trait)]
pub trait GroupSynchronization: Send + Sync {
    /// Performs a full synchronization from the directory to the local store.
    ///
    /// Running it twice without directory changes leaves local state
    /// untouched the second time.
    async fn sync_data_from_directory(&self, realm_id: Uuid) -> FederationResult<SyncResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_result_tracking() {
        let mut result = SyncResult::new(Utc::now());

        result.record_added();
        result.record_added();
        result.record_updated();
        result.record_membership();
        result.record_dangling();
        result.record_failure(SyncError::new("cn=bad,ou=Groups", "cycle").with_group_name("bad"));

        assert_eq!(result.added, 2);
        assert_eq!(result.updated, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.dangling_skipped, 1);
        assert_eq!(result.total(), 4);
        assert!(result.has_errors());
        assert!(!result.is_noop());
    }

    #[test]
    fn empty_result_is_noop() {
        let mut result = SyncResult::new(Utc::now());
        result.record_dangling();
        let result = result.complete();

        assert!(result.is_noop());
        assert!(result.status.contains("0 imported groups"));
    }
}
