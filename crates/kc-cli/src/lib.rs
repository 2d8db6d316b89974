//! # kc-cli
//!
//! Command-line front end for LDAP group federation.
//!
//! The `kc-ldap` binary provides:
//! - `sync`: a group sync pass into a scratch local store
//! - `groups`: the directory groups of a user, by either retrieval strategy
//! - `members`: the raw member references of a directory group
//! - `config`: management of `~/.keycloak/kc-ldap.toml`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
