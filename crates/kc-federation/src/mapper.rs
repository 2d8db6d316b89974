//! Federation mappers.
//!
//! A mapper is stored as a generic key/value [`MapperConfig`] attached to a
//! federation provider; typed configurations parse themselves from it.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FederationError, FederationResult};

// ============================================================================
// Mapper Configuration
// ============================================================================

/// Key/value configuration of one federation mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Mapper ID.
    pub id: Uuid,

    /// Mapper name.
    pub name: String,

    /// Mapper type, e.g. `group-ldap-mapper`.
    pub mapper_type: String,

    /// Federation provider the mapper belongs to.
    pub provider_id: String,

    /// Raw configuration values.
    pub config: BTreeMap<String, String>,
}

impl MapperConfig {
    /// Creates an empty mapper config.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        mapper_type: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            mapper_type: mapper_type.into(),
            provider_id: provider_id.into(),
            config: BTreeMap::new(),
        }
    }

    /// Adds a config value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Gets a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Gets a value that must be present.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::Configuration` if the key is missing or blank.
    pub fn require(&self, key: &str) -> FederationResult<&str> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| FederationError::config(format!("{key} is required")))
    }

    /// Parses a value with its `FromStr` implementation.
    ///
    /// ## Errors
    ///
    /// Propagates the parse error of a present value.
    pub fn parse<T>(&self, key: &str) -> FederationResult<Option<T>>
    where
        T: FromStr<Err = FederationError>,
    {
        self.get(key).map(str::parse).transpose()
    }

    /// Parses a `true`/`false` value.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::Configuration` for anything else.
    pub fn flag(&self, key: &str) -> FederationResult<Option<bool>> {
        self.get(key)
            .map(|v| {
                v.trim().parse().map_err(|_| {
                    FederationError::config(format!("{key} must be 'true' or 'false', got '{v}'"))
                })
            })
            .transpose()
    }

    /// Splits a comma separated value, skipping blanks.
    #[must_use]
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

// ============================================================================
// Federation Mapper Trait
// ============================================================================

/// A mapper bound to one federation provider.
pub trait FederationMapper: Send + Sync {
    /// Returns the mapper type identifier.
    fn mapper_type(&self) -> &'static str;

    /// Returns the id of the provider the mapper belongs to.
    fn provider_id(&self) -> &str;

    /// Exports the active configuration in key/value form.
    fn describe(&self, name: &str) -> MapperConfig;
}
