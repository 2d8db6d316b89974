//! # kc-model
//!
//! Domain models for Keycloak Rust group federation.
//!
//! This crate defines the entities shared by the local store and the
//! directory federation layer: users, hierarchical groups and the
//! membership edges that link them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod group;
pub mod membership;
pub mod tree;
pub mod user;

pub use group::{Group, GroupPath};
pub use membership::{MembershipEdge, MembershipOrigin};
pub use tree::{GroupNode, GroupTree};
pub use user::{User, LDAP_ENTRY_DN, LDAP_ID};
