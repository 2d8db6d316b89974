//! CLI configuration.
//!
//! ```toml
//! output_format = "table"
//!
//! [ldap]
//! connection_url = "ldaps://ldap.example.org:636"
//! bind_dn = "uid=admin,ou=system"
//! users_dn = "ou=People,dc=example,dc=org"
//!
//! [mapper]
//! name = "groups"
//!
//! [mapper.config]
//! "groups.dn" = "ou=Groups,dc=example,dc=org"
//! mode = "READ_ONLY"
//! ```
//!
//! The bind credential is never written back to the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kc_federation::{GroupMapperConfig, MapperConfig};
use kc_federation_ldap::LdapConfig;
use serde::{Deserialize, Serialize};

use crate::{CliError, CliResult};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Directory connection.
    pub ldap: Option<LdapConfig>,

    /// Group mapper.
    #[serde(default)]
    pub mapper: MapperSection,
}

/// The `[mapper]` section: a group mapper component configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperSection {
    /// Mapper name.
    #[serde(default = "default_mapper_name")]
    pub name: String,

    /// Mapper configuration keys (see [`GroupMapperConfig`] constants).
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

fn default_mapper_name() -> String {
    "group-ldap-mapper".to_string()
}

impl Default for MapperSection {
    fn default() -> Self {
        Self {
            name: default_mapper_name(),
            config: BTreeMap::new(),
        }
    }
}

impl MapperSection {
    /// Converts the section into a component configuration.
    #[must_use]
    pub fn to_mapper_config(&self) -> MapperConfig {
        self.config.iter().fold(
            MapperConfig::new(&self.name, GroupMapperConfig::MAPPER_TYPE, &self.name),
            |config, (key, value)| config.with_config(key, value),
        )
    }

    /// Parses and validates the group mapper configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if a key is missing or a value is invalid.
    pub fn group_mapper_config(&self) -> CliResult<GroupMapperConfig> {
        Ok(GroupMapperConfig::from_mapper_config(
            &self.to_mapper_config(),
        )?)
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| CliError::Config(format!("failed to parse config: {e}")))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to `path`.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Gets the default configuration file path.
    pub fn config_path() -> CliResult<PathBuf> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| CliError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".keycloak").join("kc-ldap.toml"))
    }

    /// Returns the directory connection, failing if none is configured.
    pub fn ldap(&self) -> CliResult<&LdapConfig> {
        self.ldap
            .as_ref()
            .ok_or_else(|| CliError::Config("missing [ldap] section".to_string()))
    }

    /// Returns a template configuration.
    #[must_use]
    pub fn template() -> Self {
        let mut config = BTreeMap::new();
        config.insert(
            GroupMapperConfig::GROUPS_DN.to_string(),
            "ou=Groups,dc=example,dc=org".to_string(),
        );
        config.insert(GroupMapperConfig::MODE.to_string(), "READ_ONLY".to_string());

        Self {
            output_format: OutputFormat::default(),
            ldap: Some(LdapConfig {
                connection_url: "ldaps://ldap.example.org:636".to_string(),
                bind_dn: "uid=admin,ou=system".to_string(),
                bind_credential: String::new(),
                validate_certificates: true,
                users_dn: "ou=People,dc=example,dc=org".to_string(),
                user_object_classes: vec![
                    "inetOrgPerson".to_string(),
                    "organizationalPerson".to_string(),
                ],
                vendor: kc_federation_ldap::LdapVendor::default(),
                username_attribute: None,
                uuid_attribute: None,
                custom_user_filter: None,
                pool_max_size: 10,
                connection_timeout: std::time::Duration::from_secs(5),
                read_timeout: std::time::Duration::from_secs(30),
            }),
            mapper: MapperSection {
                name: "groups".to_string(),
                config,
            },
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
    /// Quiet (minimal output).
    Quiet,
}

#[cfg(test)]
mod tests {
    use kc_federation::GroupMapperMode;

    use super::*;

    #[test]
    fn parses_toml() {
        let config: CliConfig = toml::from_str(
            r#"
            output_format = "json"

            [ldap]
            connection_url = "ldaps://localhost:10636"
            bind_dn = "uid=admin,ou=system"
            users_dn = "ou=People,dc=keycloak,dc=org"
            read_timeout = 10

            [mapper.config]
            "groups.dn" = "ou=Groups,dc=keycloak,dc=org"
            mode = "IMPORT"
            "memberof.ldap.attribute" = "street"
            "#,
        )
        .unwrap();

        assert!(matches!(config.output_format, OutputFormat::Json));
        let ldap = config.ldap().unwrap();
        assert_eq!(ldap.read_timeout, std::time::Duration::from_secs(10));
        assert!(ldap.bind_credential.is_empty());

        let mapper = config.mapper.group_mapper_config().unwrap();
        assert_eq!(mapper.mode, GroupMapperMode::Import);
        assert_eq!(mapper.member_of_attribute, "street");
        assert_eq!(config.mapper.name, "group-ldap-mapper");
    }

    #[test]
    fn missing_groups_dn_is_rejected() {
        let config = CliConfig::default();
        assert!(config.mapper.group_mapper_config().is_err());
        assert!(config.ldap().is_err());
    }

    #[test]
    fn template_round_trips_without_credential() {
        let mut template = CliConfig::template();
        if let Some(ldap) = template.ldap.as_mut() {
            ldap.bind_credential = "secret".to_string();
        }

        let text = toml::to_string_pretty(&template).unwrap();
        assert!(!text.contains("secret"));

        let parsed: CliConfig = toml::from_str(&text).unwrap();
        assert!(parsed.mapper.group_mapper_config().is_ok());
    }
}
