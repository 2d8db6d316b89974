//! Group mapper modes and the membership policy they imply.
//!
//! | Mode        | Read                 | Join      | Leave                                  |
//! |-------------|----------------------|-----------|----------------------------------------|
//! | `LDAP_ONLY` | directory            | directory | directory                              |
//! | `READ_ONLY` | local + directory    | local     | local; directory link is a violation   |
//! | `IMPORT`    | local                | local     | local                                  |
//!
//! The table applies to groups owned by the mapper. Groups outside the
//! mapper are always read and written through the local store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, FederationResult};

/// Where group membership truth lives for one mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupMapperMode {
    /// The directory is the only source; memberships are written to it.
    LdapOnly,

    /// Directory memberships are visible but immutable; local ones may be added.
    #[default]
    ReadOnly,

    /// Memberships are copied locally and then managed locally.
    Import,
}

/// Which stores a membership read consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSources {
    /// Consult local edges.
    pub local: bool,
    /// Consult the directory.
    pub directory: bool,
}

/// Where a join is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
    /// Add the member link on the directory group.
    AddDirectoryLink,
    /// Add a local edge.
    AddLocalEdge,
}

/// What a leave does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveAction {
    /// Remove the member link from the directory group.
    RemoveDirectoryLink,
    /// Remove the local edge.
    RemoveLocalEdge,
}

impl GroupMapperMode {
    /// Returns the configuration value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LdapOnly => "LDAP_ONLY",
            Self::ReadOnly => "READ_ONLY",
            Self::Import => "IMPORT",
        }
    }

    /// Returns the stores consulted when reading mapper group memberships.
    #[must_use]
    pub const fn read_sources(&self) -> ReadSources {
        match self {
            Self::LdapOnly => ReadSources {
                local: false,
                directory: true,
            },
            Self::ReadOnly => ReadSources {
                local: true,
                directory: true,
            },
            Self::Import => ReadSources {
                local: true,
                directory: false,
            },
        }
    }

    /// Decides where a join to a mapper group is written.
    #[must_use]
    pub const fn join_action(&self) -> JoinAction {
        match self {
            Self::LdapOnly => JoinAction::AddDirectoryLink,
            Self::ReadOnly | Self::Import => JoinAction::AddLocalEdge,
        }
    }

    /// Decides what a leave from a mapper group does.
    ///
    /// `directory_linked` tells whether the directory currently lists the
    /// user as a member of the group.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::PolicyViolation` in `READ_ONLY` mode when
    /// the membership comes from the directory.
    pub fn leave_action(&self, directory_linked: bool) -> FederationResult<LeaveAction> {
        match self {
            Self::LdapOnly => Ok(LeaveAction::RemoveDirectoryLink),
            Self::ReadOnly if directory_linked => Err(FederationError::policy(
                "Not possible to delete LDAP group membership in READ_ONLY mode",
            )),
            Self::ReadOnly | Self::Import => Ok(LeaveAction::RemoveLocalEdge),
        }
    }

    /// Returns true if sync stores directory memberships as local edges.
    #[must_use]
    pub const fn imports_memberships(&self) -> bool {
        matches!(self, Self::Import)
    }

    /// Returns true if the mapper writes to the directory.
    #[must_use]
    pub const fn is_directory_writable(&self) -> bool {
        matches!(self, Self::LdapOnly)
    }
}

impl FromStr for GroupMapperMode {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LDAP_ONLY" => Ok(Self::LdapOnly),
            "READ_ONLY" => Ok(Self::ReadOnly),
            "IMPORT" => Ok(Self::Import),
            other => Err(FederationError::config(format!("Unknown mode '{other}'"))),
        }
    }
}

impl fmt::Display for GroupMapperMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
