//! # kc-storage
//!
//! Storage abstraction traits for Keycloak Rust.
//!
//! This crate defines the local store interfaces used by the group
//! federation layer, plus an in-memory backend.
//!
//! ## Provider Traits
//!
//! - [`GroupProvider`] - CRUD and path resolution for groups
//! - [`UserProvider`] - CRUD operations for users
//! - [`MembershipProvider`] - join/leave and membership listing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod group;
pub mod membership;
pub mod memory;
pub mod user;

pub use error::{EntityKind, StorageError, StorageResult};
pub use group::GroupProvider;
pub use membership::MembershipProvider;
pub use memory::InMemoryStore;
pub use user::UserProvider;

/// A local store offering groups, users and memberships together.
pub trait LocalStore: GroupProvider + UserProvider + MembershipProvider {}

impl<T> LocalStore for T where T: GroupProvider + UserProvider + MembershipProvider {}
