//! Configuration management commands.

use std::path::Path;

use kc_federation::GroupMapperConfig;

use crate::cli::ConfigCommand;
use crate::config::OutputFormat;
use crate::output::{confirm, info, output_single, success};
use crate::{CliConfig, CliError, CliResult};

/// Mapper keys accepted by `config set`.
const MAPPER_KEYS: &[&str] = &[
    GroupMapperConfig::GROUPS_DN,
    GroupMapperConfig::MODE,
    GroupMapperConfig::MEMBERSHIP_LDAP_ATTRIBUTE,
    GroupMapperConfig::MEMBERSHIP_ATTRIBUTE_TYPE,
    GroupMapperConfig::USER_ROLES_RETRIEVE_STRATEGY,
    GroupMapperConfig::MEMBEROF_LDAP_ATTRIBUTE,
    GroupMapperConfig::GROUP_NAME_LDAP_ATTRIBUTE,
    GroupMapperConfig::GROUP_OBJECT_CLASSES,
    GroupMapperConfig::PRESERVE_GROUP_INHERITANCE,
    GroupMapperConfig::GROUPS_PATH,
    GroupMapperConfig::MAPPED_GROUP_ATTRIBUTES,
    GroupMapperConfig::DROP_NON_EXISTING_GROUPS_DURING_SYNC,
];

/// Runs a config command against the file at `path`.
pub fn run_config(
    cmd: ConfigCommand,
    config: &mut CliConfig,
    path: &Path,
    format: OutputFormat,
) -> CliResult<()> {
    match cmd {
        ConfigCommand::Show => show_config(config, path, format),
        ConfigCommand::Set { key, value } => {
            set_value(config, &key, &value)?;
            config.save(path)?;
            success(&format!("Set {key} = {value}"));
            Ok(())
        }
        ConfigCommand::Init { force } => init_config(path, force),
    }
}

fn show_config(config: &CliConfig, path: &Path, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            info(&format!("Configuration file: {}", path.display()));
            println!();
            let text = toml::to_string_pretty(config)
                .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))?;
            print!("{text}");
            Ok(())
        }
        _ => output_single(config, format),
    }
}

/// Applies `key = value`, rejecting values the mapper would not accept.
fn set_value(config: &mut CliConfig, key: &str, value: &str) -> CliResult<()> {
    match key {
        "output_format" | "output" => {
            config.output_format = match value.to_lowercase().as_str() {
                "table" => OutputFormat::Table,
                "json" => OutputFormat::Json,
                "yaml" => OutputFormat::Yaml,
                "quiet" => OutputFormat::Quiet,
                _ => {
                    return Err(CliError::InvalidArgument(format!(
                        "Unknown output format: {value}. Supported: table, json, yaml, quiet"
                    )));
                }
            };
        }
        "mapper.name" => config.mapper.name = value.to_string(),
        "ldap.connection_url" | "ldap.bind_dn" | "ldap.users_dn" => {
            let ldap = config.ldap.as_mut().ok_or_else(|| {
                CliError::Config("missing [ldap] section, run `config init` first".to_string())
            })?;
            match key {
                "ldap.connection_url" => ldap.connection_url = value.to_string(),
                "ldap.bind_dn" => ldap.bind_dn = value.to_string(),
                _ => ldap.users_dn = value.to_string(),
            }
        }
        _ if MAPPER_KEYS.contains(&key) => {
            let previous = config
                .mapper
                .config
                .insert(key.to_string(), value.to_string());
            if config.mapper.config.contains_key(GroupMapperConfig::GROUPS_DN) {
                if let Err(e) = config.mapper.group_mapper_config() {
                    match previous {
                        Some(old) => config.mapper.config.insert(key.to_string(), old),
                        None => config.mapper.config.remove(key),
                    };
                    return Err(CliError::InvalidArgument(e.to_string()));
                }
            }
        }
        _ => {
            return Err(CliError::InvalidArgument(format!(
                "Unknown configuration key: {key}. Known keys: output_format, mapper.name, \
                 ldap.connection_url, ldap.bind_dn, ldap.users_dn, {}",
                MAPPER_KEYS.join(", ")
            )));
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> CliResult<()> {
    if path.exists()
        && !force
        && !confirm(&format!("{} exists. Overwrite?", path.display()))?
    {
        return Err(CliError::Cancelled);
    }

    CliConfig::template().save(path)?;
    success(&format!("Configuration written to: {}", path.display()));
    info("Edit the [ldap] and [mapper.config] sections before running `sync`");
    Ok(())
}
