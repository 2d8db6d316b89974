//! # kc-federation-ldap
//!
//! LDAP group federation for Keycloak Rust.
//!
//! This crate maps groups stored in an LDAP directory onto local groups and
//! routes membership reads and writes according to the mapper mode.
//!
//! ## Layers
//!
//! - [`LdapDirectory`] - the directory operations the mapper needs, backed by
//!   a live LDAPS server ([`LdapServerDirectory`], via `ldap3`) or an
//!   in-memory tree ([`InMemoryDirectory`])
//! - [`DirectoryGroupAdapter`] - group and user lookups, membership links,
//!   member resolution
//! - [`DirectoryGroupTree`] - directory group hierarchy
//! - [`GroupLdapMapper`] - query and mutation surface, and the group sync job
//!
//! ## Security Requirements
//!
//! - Only LDAPS connections are accepted
//! - Bind credentials are never logged or serialized

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod connection;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod error;
pub mod mapper;
pub mod memory;
pub mod server;
pub mod strategy;
pub mod sync;
pub mod tree;

pub use adapter::{
    DirectoryGroup, DirectoryGroupAdapter, DirectoryUser, MemberResolution,
    EMPTY_MEMBER_PLACEHOLDER,
};
pub use config::{LdapConfig, LdapConfigBuilder, LdapVendor};
pub use connection::LdapConnectionPool;
pub use directory::{GroupQuery, LdapDirectory};
pub use entry::LdapEntry;
pub use error::{LdapError, LdapResult};
pub use mapper::GroupLdapMapper;
pub use memory::InMemoryDirectory;
pub use server::LdapServerDirectory;
pub use tree::{DirectoryGroupTree, MappedGroup};
