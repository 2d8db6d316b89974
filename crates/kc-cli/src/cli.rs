//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kc_federation::{GroupMapperMode, MembershipRetrieveStrategy};

use crate::config::OutputFormat;

/// kc-ldap - LDAP group federation tool for Keycloak Rust.
#[derive(Debug, Parser)]
#[command(name = "kc-ldap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ~/.keycloak/kc-ldap.toml).
    #[arg(short, long, env = "KC_LDAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// LDAP bind credential (overrides config).
    #[arg(long, env = "KC_LDAP_BIND_CREDENTIAL", hide_env_values = true)]
    pub bind_credential: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a group sync pass and show the resulting local group tree.
    Sync {
        /// Mapper mode for this pass (overrides config).
        #[arg(long, value_parser = parse_mode)]
        mode: Option<GroupMapperMode>,
    },

    /// List the directory groups of a user.
    Groups {
        /// Username.
        username: String,

        /// Retrieval strategy (overrides config).
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<MembershipRetrieveStrategy>,
    },

    /// List the raw member references of a directory group.
    Members {
        /// Group name.
        group: String,
    },

    /// Configuration management.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,

    /// Set a group mapper configuration value.
    Set {
        /// Mapper configuration key (e.g. `mode`, `groups.dn`).
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Write a configuration template.
    Init {
        /// Overwrite an existing file without asking.
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_mode(s: &str) -> Result<GroupMapperMode, String> {
    s.to_ascii_uppercase().parse().map_err(|e| format!("{e}"))
}

fn parse_strategy(s: &str) -> Result<MembershipRetrieveStrategy, String> {
    s.to_ascii_uppercase().parse().map_err(|e| format!("{e}"))
}
