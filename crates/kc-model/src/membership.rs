//! Group membership edges.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a membership edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipOrigin {
    /// Created through the local store (join/add operations).
    #[default]
    Local,
    /// Read from, or imported from, the external directory.
    Directory,
}

/// A (user, group, origin) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipEdge {
    /// Member user ID.
    pub user_id: Uuid,
    /// Group ID.
    pub group_id: Uuid,
    /// Origin of the edge.
    pub origin: MembershipOrigin,
}

impl MembershipEdge {
    /// Creates a local-origin edge.
    #[must_use]
    pub const fn local(user_id: Uuid, group_id: Uuid) -> Self {
        Self {
            user_id,
            group_id,
            origin: MembershipOrigin::Local,
        }
    }

    /// Creates a directory-origin edge.
    #[must_use]
    pub const fn directory(user_id: Uuid, group_id: Uuid) -> Self {
        Self {
            user_id,
            group_id,
            origin: MembershipOrigin::Directory,
        }
    }

    /// Checks if the edge originates from the directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.origin, MembershipOrigin::Directory)
    }
}
