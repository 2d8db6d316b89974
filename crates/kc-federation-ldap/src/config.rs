//! LDAP directory connection configuration.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Only LDAPS (LDAP over TLS) is supported.
//!
//! - Connection URLs MUST start with `ldaps://`
//! - STARTTLS is NOT supported (vulnerable to downgrade attacks)
//! - Plain `ldap://` is NOT supported (credentials transmitted in cleartext)

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LdapError, LdapResult};

// ============================================================================
// LDAP Vendor
// ============================================================================

/// Known LDAP directory vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LdapVendor {
    /// Generic LDAP (RFC 4510 compliant).
    #[default]
    Other,

    /// Microsoft Active Directory.
    ActiveDirectory,

    /// Red Hat Directory Server / 389 Directory Server.
    Rhds,

    /// OpenLDAP.
    OpenLdap,
}

impl LdapVendor {
    /// Returns the default UUID attribute for this vendor.
    #[must_use]
    pub const fn uuid_attribute(&self) -> &'static str {
        match self {
            Self::ActiveDirectory => "objectGUID",
            Self::Rhds => "nsUniqueId",
            Self::OpenLdap | Self::Other => "entryUUID",
        }
    }

    /// Returns the default username attribute for this vendor.
    #[must_use]
    pub const fn username_attribute(&self) -> &'static str {
        match self {
            Self::ActiveDirectory => "sAMAccountName",
            _ => "uid",
        }
    }
}

// ============================================================================
// LDAP Configuration
// ============================================================================

/// LDAP directory configuration.
///
/// ## Security Requirements
///
/// The `connection_url` MUST use the `ldaps://` scheme.
/// Any attempt to use `ldap://` or STARTTLS will be rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    // === Connection ===
    /// LDAP server URL (MUST be ldaps://).
    pub connection_url: String,

    /// Bind DN for service account.
    pub bind_dn: String,

    /// Bind credential (password).
    #[serde(skip_serializing, default)]
    pub bind_credential: String,

    /// Whether to validate server certificates.
    #[serde(default = "default_true")]
    pub validate_certificates: bool,

    // === Directory Structure ===
    /// Base DN for user searches.
    pub users_dn: String,

    /// User object classes.
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// LDAP vendor.
    #[serde(default)]
    pub vendor: LdapVendor,

    /// Attribute holding the username (vendor default if unset).
    #[serde(default)]
    pub username_attribute: Option<String>,

    /// UUID attribute for external ID (vendor default if unset).
    #[serde(default)]
    pub uuid_attribute: Option<String>,

    /// Custom user search filter, e.g. `(ou=staff)`.
    #[serde(default)]
    pub custom_user_filter: Option<String>,

    // === Connection Pool ===
    /// Maximum concurrent operations.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,

    /// Connection timeout.
    #[serde(with = "duration_secs", default = "default_connection_timeout")]
    pub connection_timeout: Duration,

    /// Read timeout for operations.
    #[serde(with = "duration_secs", default = "default_read_timeout")]
    pub read_timeout: Duration,
}

const fn default_true() -> bool {
    true
}

fn default_user_object_classes() -> Vec<String> {
    vec!["inetOrgPerson".to_string(), "organizationalPerson".to_string()]
}

const fn default_pool_max_size() -> usize {
    10
}

const fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// ## Security
    ///
    /// This method enforces LDAPS-only connections.
    ///
    /// ## Errors
    ///
    /// Returns `LdapError::InsecureProtocol` for non-LDAPS URLs and
    /// `LdapError::Configuration` for missing values.
    pub fn validate(&self) -> LdapResult<()> {
        validate_ldaps_url(&self.connection_url)?;

        if self.bind_dn.is_empty() {
            return Err(LdapError::config("bind_dn cannot be empty"));
        }
        if self.users_dn.is_empty() {
            return Err(LdapError::config("users_dn cannot be empty"));
        }
        if self.user_object_classes.is_empty() {
            return Err(LdapError::config("user_object_classes cannot be empty"));
        }
        if self.pool_max_size == 0 {
            return Err(LdapError::config("pool_max_size must be at least 1"));
        }

        Ok(())
    }

    /// Returns the attribute holding usernames.
    #[must_use]
    pub fn username_attribute(&self) -> &str {
        self.username_attribute
            .as_deref()
            .unwrap_or_else(|| self.vendor.username_attribute())
    }

    /// Returns the attribute holding the external ID.
    #[must_use]
    pub fn uuid_attribute(&self) -> &str {
        self.uuid_attribute
            .as_deref()
            .unwrap_or_else(|| self.vendor.uuid_attribute())
    }

    /// Gets the search filter for users.
    #[must_use]
    pub fn user_search_filter(&self) -> String {
        let base_filter = object_class_filter(&self.user_object_classes);

        match &self.custom_user_filter {
            Some(custom) => format!("(&{base_filter}{custom})"),
            None => base_filter,
        }
    }

    /// Gets the full user search filter with username.
    #[must_use]
    pub fn user_by_username_filter(&self, username: &str) -> String {
        let base = self.user_search_filter();
        let escaped = ldap_escape(username);
        format!("(&{base}({}={escaped}))", self.username_attribute())
    }
}

/// Validates that a URL uses LDAPS.
///
/// ## Security
///
/// **CRITICAL**: Only `ldaps://` URLs are accepted.
/// - `ldap://` is rejected (cleartext credentials)
/// - STARTTLS is not supported (vulnerable to downgrade attacks)
fn validate_ldaps_url(url: &str) -> LdapResult<()> {
    if !url.to_lowercase().starts_with("ldaps://") {
        return Err(LdapError::InsecureProtocol);
    }

    // "ldaps://" is 8 chars
    if url.len() <= 8 {
        return Err(LdapError::config("Invalid LDAPS URL: missing host"));
    }

    Ok(())
}

/// Builds `(objectClass=a)` or `(&(objectClass=a)(objectClass=b))`.
pub(crate) fn object_class_filter(classes: &[String]) -> String {
    let parts: Vec<String> = classes
        .iter()
        .map(|c| format!("(objectClass={})", ldap_escape(c)))
        .collect();

    if parts.len() == 1 {
        parts[0].clone()
    } else {
        format!("(&{})", parts.join(""))
    }
}

/// Escapes special characters in LDAP filter values.
pub(crate) fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for LDAP configuration.
#[derive(Debug, Default)]
pub struct LdapConfigBuilder {
    connection_url: Option<String>,
    bind_dn: Option<String>,
    bind_credential: Option<String>,
    validate_certificates: bool,
    users_dn: Option<String>,
    user_object_classes: Vec<String>,
    vendor: LdapVendor,
    username_attribute: Option<String>,
    uuid_attribute: Option<String>,
    custom_user_filter: Option<String>,
    pool_max_size: usize,
    connection_timeout: Duration,
    read_timeout: Duration,
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_certificates: true,
            user_object_classes: default_user_object_classes(),
            pool_max_size: default_pool_max_size(),
            connection_timeout: default_connection_timeout(),
            read_timeout: default_read_timeout(),
            ..Default::default()
        }
    }

    /// Sets the connection URL (must be ldaps://).
    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Sets the bind DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the bind credential (password).
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Sets whether to validate certificates.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets the users DN.
    #[must_use]
    pub fn users_dn(mut self, dn: impl Into<String>) -> Self {
        self.users_dn = Some(dn.into());
        self
    }

    /// Sets the user object classes.
    #[must_use]
    pub fn user_object_classes(mut self, classes: Vec<String>) -> Self {
        self.user_object_classes = classes;
        self
    }

    /// Sets the LDAP vendor.
    #[must_use]
    pub const fn vendor(mut self, vendor: LdapVendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// Sets the username attribute.
    #[must_use]
    pub fn username_attribute(mut self, attr: impl Into<String>) -> Self {
        self.username_attribute = Some(attr.into());
        self
    }

    /// Sets the UUID attribute.
    #[must_use]
    pub fn uuid_attribute(mut self, attr: impl Into<String>) -> Self {
        self.uuid_attribute = Some(attr.into());
        self
    }

    /// Sets the custom user search filter.
    #[must_use]
    pub fn custom_user_filter(mut self, filter: impl Into<String>) -> Self {
        self.custom_user_filter = Some(filter.into());
        self
    }

    /// Sets the maximum number of concurrent operations.
    #[must_use]
    pub const fn pool_max_size(mut self, max: usize) -> Self {
        self.pool_max_size = max;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing
    /// - Connection URL does not use LDAPS
    pub fn build(self) -> LdapResult<LdapConfig> {
        let config = LdapConfig {
            connection_url: self
                .connection_url
                .ok_or_else(|| LdapError::config("connection_url is required"))?,
            bind_dn: self
                .bind_dn
                .ok_or_else(|| LdapError::config("bind_dn is required"))?,
            bind_credential: self
                .bind_credential
                .ok_or_else(|| LdapError::config("bind_credential is required"))?,
            validate_certificates: self.validate_certificates,
            users_dn: self
                .users_dn
                .ok_or_else(|| LdapError::config("users_dn is required"))?,
            user_object_classes: self.user_object_classes,
            vendor: self.vendor,
            username_attribute: self.username_attribute,
            uuid_attribute: self.uuid_attribute,
            custom_user_filter: self.custom_user_filter,
            pool_max_size: self.pool_max_size,
            connection_timeout: self.connection_timeout,
            read_timeout: self.read_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> LdapConfigBuilder {
        LdapConfig::builder()
            .bind_dn("uid=admin,ou=system")
            .bind_credential("secret")
            .users_dn("ou=People,dc=keycloak,dc=org")
    }

    #[test]
    fn rejects_ldap_url() {
        let err = builder()
            .connection_url("ldap://localhost:10389")
            .build()
            .unwrap_err();

        assert!(matches!(err, LdapError::InsecureProtocol));
    }

    #[test]
    fn rejects_url_without_host() {
        let err = builder().connection_url("ldaps://").build().unwrap_err();
        assert!(matches!(err, LdapError::Configuration(_)));
    }

    #[test]
    fn accepts_ldaps_url() {
        let config = builder()
            .connection_url("ldaps://localhost:10636")
            .build()
            .unwrap();

        assert!(config.validate_certificates);
        assert_eq!(config.username_attribute(), "uid");
        assert_eq!(config.uuid_attribute(), "entryUUID");
    }

    #[test]
    fn vendor_defaults() {
        let config = builder()
            .connection_url("ldaps://ad.example.com")
            .vendor(LdapVendor::ActiveDirectory)
            .build()
            .unwrap();

        assert_eq!(config.username_attribute(), "sAMAccountName");
        assert_eq!(config.uuid_attribute(), "objectGUID");
    }

    #[test]
    fn ldap_escape_special_chars() {
        assert_eq!(ldap_escape("john*"), "john\\2a");
        assert_eq!(ldap_escape("(admin)"), "\\28admin\\29");
        assert_eq!(ldap_escape("user\\name"), "user\\5cname");
        assert_eq!(ldap_escape("Team 2016/2017"), "Team 2016/2017");
    }

    #[test]
    fn user_search_filter() {
        let config = builder()
            .connection_url("ldaps://localhost:10636")
            .custom_user_filter("(ou=staff)")
            .build()
            .unwrap();

        let filter = config.user_by_username_filter("jbrown");
        assert!(filter.contains("(uid=jbrown)"));
        assert!(filter.contains("(objectClass=inetOrgPerson)"));
        assert!(filter.contains("(ou=staff)"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "connection_url": "ldaps://localhost:10636",
            "bind_dn": "uid=admin,ou=system",
            "bind_credential": "secret",
            "users_dn": "ou=People,dc=keycloak,dc=org",
            "read_timeout": 10
        }"#;
        let config: LdapConfig = serde_json::from_str(json).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_max_size, 10);
    }
}
