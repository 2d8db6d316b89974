//! # kc-federation
//!
//! Federation framework for Keycloak Rust.
//!
//! This crate provides the configuration, mode policy and synchronization
//! types shared by group federation providers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod mapper;
pub mod mode;
pub mod sync;

pub use config::{
    GroupMapperConfig, GroupMapperConfigBuilder, MembershipRetrieveStrategy, MembershipType,
};
pub use error::{FederationError, FederationResult};
pub use mapper::{FederationMapper, MapperConfig};
pub use mode::{GroupMapperMode, JoinAction, LeaveAction, ReadSources};
pub use sync::{GroupSynchronization, SyncError, SyncResult};
