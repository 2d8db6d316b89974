//! Group mapper configuration.
//!
//! The typed [`GroupMapperConfig`] is built either through its builder or
//! from the generic key/value [`MapperConfig`] stored with a federation
//! component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FederationError, FederationResult};
use crate::mapper::MapperConfig;
use crate::mode::GroupMapperMode;

// ============================================================================
// Membership Settings
// ============================================================================

/// What the group membership attribute stores for each member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MembershipType {
    /// Full distinguished name of the member (`member: uid=john,ou=People,...`).
    #[default]
    #[serde(rename = "DN")]
    Dn,

    /// Username of the member (`memberUid: john`). Cannot express nested groups.
    #[serde(rename = "UID")]
    Uid,
}

impl MembershipType {
    /// Returns the configuration value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dn => "DN",
            Self::Uid => "UID",
        }
    }
}

impl FromStr for MembershipType {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DN" => Ok(Self::Dn),
            "UID" => Ok(Self::Uid),
            other => Err(FederationError::config(format!(
                "Unknown membership type '{other}'"
            ))),
        }
    }
}

/// How a user's directory groups are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MembershipRetrieveStrategy {
    /// Scan groups and match the user against each group's membership attribute.
    #[default]
    #[serde(rename = "LOAD_GROUPS_BY_MEMBER_ATTRIBUTE")]
    LoadGroupsByMemberAttribute,

    /// Read group DNs from an attribute on the user entry (`memberOf` by default).
    #[serde(rename = "GET_GROUPS_FROM_USER_MEMBEROF_ATTRIBUTE")]
    GetGroupsFromUserMemberOfAttribute,
}

impl MembershipRetrieveStrategy {
    /// Returns the configuration value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LoadGroupsByMemberAttribute => "LOAD_GROUPS_BY_MEMBER_ATTRIBUTE",
            Self::GetGroupsFromUserMemberOfAttribute => "GET_GROUPS_FROM_USER_MEMBEROF_ATTRIBUTE",
        }
    }
}

impl FromStr for MembershipRetrieveStrategy {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LOAD_GROUPS_BY_MEMBER_ATTRIBUTE" => Ok(Self::LoadGroupsByMemberAttribute),
            "GET_GROUPS_FROM_USER_MEMBEROF_ATTRIBUTE" => {
                Ok(Self::GetGroupsFromUserMemberOfAttribute)
            }
            other => Err(FederationError::config(format!(
                "Unknown membership retrieve strategy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MembershipRetrieveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Group Mapper Configuration
// ============================================================================

/// Typed configuration of one group mapper.
///
/// A mapper binds one directory group subtree (`groups_dn`) to one local
/// group subtree (`groups_path`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapperConfig {
    /// Where membership truth lives.
    pub mode: GroupMapperMode,

    /// Attribute on group entries listing members.
    pub membership_attribute: String,

    /// What the membership attribute stores.
    pub membership_type: MembershipType,

    /// How a user's groups are looked up.
    pub retrieve_strategy: MembershipRetrieveStrategy,

    /// Attribute on user entries listing groups (for the member-of strategy).
    pub member_of_attribute: String,

    /// Base DN of directory groups.
    pub groups_dn: String,

    /// Attribute holding the group name (also the group RDN attribute).
    pub group_name_attribute: String,

    /// Object classes of directory groups.
    pub group_object_classes: Vec<String>,

    /// Mirror directory group nesting in the local tree.
    pub preserve_group_inheritance: bool,

    /// Local subtree owned by the mapper (`/` for top level).
    pub groups_path: String,

    /// Directory attributes copied onto local groups.
    pub mapped_group_attributes: Vec<String>,

    /// Delete local groups missing from the directory during sync.
    pub drop_non_existing_groups: bool,
}

impl GroupMapperConfig {
    /// Mapper type identifier stored in [`MapperConfig::mapper_type`].
    pub const MAPPER_TYPE: &'static str = "group-ldap-mapper";

    /// Config key for the mode.
    pub const MODE: &'static str = "mode";
    /// Config key for the membership attribute.
    pub const MEMBERSHIP_LDAP_ATTRIBUTE: &'static str = "membership.ldap.attribute";
    /// Config key for the membership type.
    pub const MEMBERSHIP_ATTRIBUTE_TYPE: &'static str = "membership.attribute.type";
    /// Config key for the retrieve strategy.
    pub const USER_ROLES_RETRIEVE_STRATEGY: &'static str = "user.roles.retrieve.strategy";
    /// Config key for the member-of attribute.
    pub const MEMBEROF_LDAP_ATTRIBUTE: &'static str = "memberof.ldap.attribute";
    /// Config key for the groups base DN.
    pub const GROUPS_DN: &'static str = "groups.dn";
    /// Config key for the group name attribute.
    pub const GROUP_NAME_LDAP_ATTRIBUTE: &'static str = "group.name.ldap.attribute";
    /// Config key for group object classes (comma separated).
    pub const GROUP_OBJECT_CLASSES: &'static str = "group.object.classes";
    /// Config key for inheritance preservation.
    pub const PRESERVE_GROUP_INHERITANCE: &'static str = "preserve.group.inheritance";
    /// Config key for the local groups path.
    pub const GROUPS_PATH: &'static str = "groups.path";
    /// Config key for mapped group attributes (comma separated).
    pub const MAPPED_GROUP_ATTRIBUTES: &'static str = "mapped.group.attributes";
    /// Config key for dropping non-existing groups.
    pub const DROP_NON_EXISTING_GROUPS_DURING_SYNC: &'static str =
        "drop.non.existing.groups.during.sync";

    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder(groups_dn: impl Into<String>) -> GroupMapperConfigBuilder {
        GroupMapperConfigBuilder::new(groups_dn)
    }

    /// Parses a generic mapper configuration.
    ///
    /// Missing keys take their defaults.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::Configuration` if a value cannot be parsed,
    /// `groups.dn` is missing, or the combination is invalid.
    pub fn from_mapper_config(config: &MapperConfig) -> FederationResult<Self> {
        let mut builder = Self::builder(config.require(Self::GROUPS_DN)?);

        if let Some(mode) = config.parse::<GroupMapperMode>(Self::MODE)? {
            builder = builder.mode(mode);
        }
        if let Some(attr) = config.get(Self::MEMBERSHIP_LDAP_ATTRIBUTE) {
            builder = builder.membership_attribute(attr);
        }
        if let Some(kind) = config.parse::<MembershipType>(Self::MEMBERSHIP_ATTRIBUTE_TYPE)? {
            builder = builder.membership_type(kind);
        }
        if let Some(strategy) = config.parse::<MembershipRetrieveStrategy>(Self::USER_ROLES_RETRIEVE_STRATEGY)? {
            builder = builder.retrieve_strategy(strategy);
        }
        if let Some(attr) = config.get(Self::MEMBEROF_LDAP_ATTRIBUTE) {
            builder = builder.member_of_attribute(attr);
        }
        if let Some(attr) = config.get(Self::GROUP_NAME_LDAP_ATTRIBUTE) {
            builder = builder.group_name_attribute(attr);
        }
        if let Some(classes) = config.list(Self::GROUP_OBJECT_CLASSES) {
            builder = builder.group_object_classes(classes);
        }
        if let Some(preserve) = config.flag(Self::PRESERVE_GROUP_INHERITANCE)? {
            builder = builder.preserve_group_inheritance(preserve);
        }
        if let Some(path) = config.get(Self::GROUPS_PATH) {
            builder = builder.groups_path(path);
        }
        if let Some(attrs) = config.list(Self::MAPPED_GROUP_ATTRIBUTES) {
            builder = builder.mapped_group_attributes(attrs);
        }
        if let Some(drop) = config.flag(Self::DROP_NON_EXISTING_GROUPS_DURING_SYNC)? {
            builder = builder.drop_non_existing_groups(drop);
        }

        builder.build()
    }

    /// Writes this configuration back into key/value form.
    pub fn apply_to(&self, config: &mut MapperConfig) {
        let entries = [
            (Self::MODE, self.mode.as_str().to_string()),
            (Self::MEMBERSHIP_LDAP_ATTRIBUTE, self.membership_attribute.clone()),
            (
                Self::MEMBERSHIP_ATTRIBUTE_TYPE,
                self.membership_type.as_str().to_string(),
            ),
            (
                Self::USER_ROLES_RETRIEVE_STRATEGY,
                self.retrieve_strategy.as_str().to_string(),
            ),
            (Self::MEMBEROF_LDAP_ATTRIBUTE, self.member_of_attribute.clone()),
            (Self::GROUPS_DN, self.groups_dn.clone()),
            (Self::GROUP_NAME_LDAP_ATTRIBUTE, self.group_name_attribute.clone()),
            (Self::GROUP_OBJECT_CLASSES, self.group_object_classes.join(",")),
            (
                Self::PRESERVE_GROUP_INHERITANCE,
                self.preserve_group_inheritance.to_string(),
            ),
            (Self::GROUPS_PATH, self.groups_path.clone()),
            (
                Self::MAPPED_GROUP_ATTRIBUTES,
                self.mapped_group_attributes.join(","),
            ),
            (
                Self::DROP_NON_EXISTING_GROUPS_DURING_SYNC,
                self.drop_non_existing_groups.to_string(),
            ),
        ];
        for (key, value) in entries {
            config.config.insert(key.to_string(), value);
        }
    }

    /// Returns a copy with another mode.
    ///
    /// Mode changes are administrative: a mapper built from the returned
    /// value sees the new mode, existing mappers keep theirs.
    #[must_use]
    pub fn with_mode(&self, mode: GroupMapperMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    /// Returns a copy with another retrieve strategy.
    #[must_use]
    pub fn with_retrieve_strategy(&self, strategy: MembershipRetrieveStrategy) -> Self {
        Self {
            retrieve_strategy: strategy,
            ..self.clone()
        }
    }

    /// Returns the LDAP filter selecting this mapper's groups.
    #[must_use]
    pub fn group_filter(&self) -> String {
        let classes: Vec<String> = self
            .group_object_classes
            .iter()
            .map(|c| format!("(objectClass={c})"))
            .collect();
        if classes.len() == 1 {
            classes[0].clone()
        } else {
            format!("(&{})", classes.join(""))
        }
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for [`GroupMapperConfig`].
#[derive(Debug)]
pub struct GroupMapperConfigBuilder {
    config: GroupMapperConfig,
}

impl GroupMapperConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new(groups_dn: impl Into<String>) -> Self {
        Self {
            config: GroupMapperConfig {
                mode: GroupMapperMode::default(),
                membership_attribute: "member".to_string(),
                membership_type: MembershipType::default(),
                retrieve_strategy: MembershipRetrieveStrategy::default(),
                member_of_attribute: "memberOf".to_string(),
                groups_dn: groups_dn.into(),
                group_name_attribute: "cn".to_string(),
                group_object_classes: vec!["groupOfNames".to_string()],
                preserve_group_inheritance: true,
                groups_path: "/".to_string(),
                mapped_group_attributes: Vec::new(),
                drop_non_existing_groups: false,
            },
        }
    }

    /// Sets the mode.
    #[must_use]
    pub const fn mode(mut self, mode: GroupMapperMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the membership attribute.
    #[must_use]
    pub fn membership_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.membership_attribute = attr.into();
        self
    }

    /// Sets the membership type.
    #[must_use]
    pub const fn membership_type(mut self, kind: MembershipType) -> Self {
        self.config.membership_type = kind;
        self
    }

    /// Sets the retrieve strategy.
    #[must_use]
    pub const fn retrieve_strategy(mut self, strategy: MembershipRetrieveStrategy) -> Self {
        self.config.retrieve_strategy = strategy;
        self
    }

    /// Sets the member-of attribute on user entries.
    #[must_use]
    pub fn member_of_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.member_of_attribute = attr.into();
        self
    }

    /// Sets the group name attribute.
    #[must_use]
    pub fn group_name_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.group_name_attribute = attr.into();
        self
    }

    /// Sets the group object classes.
    #[must_use]
    pub fn group_object_classes(mut self, classes: Vec<String>) -> Self {
        self.config.group_object_classes = classes;
        self
    }

    /// Sets whether directory nesting is mirrored locally.
    #[must_use]
    pub const fn preserve_group_inheritance(mut self, preserve: bool) -> Self {
        self.config.preserve_group_inheritance = preserve;
        self
    }

    /// Sets the local groups path.
    #[must_use]
    pub fn groups_path(mut self, path: impl Into<String>) -> Self {
        self.config.groups_path = path.into();
        self
    }

    /// Sets the mapped group attributes.
    #[must_use]
    pub fn mapped_group_attributes(mut self, attrs: Vec<String>) -> Self {
        self.config.mapped_group_attributes = attrs;
        self
    }

    /// Sets whether local groups missing in the directory are dropped on sync.
    #[must_use]
    pub const fn drop_non_existing_groups(mut self, drop: bool) -> Self {
        self.config.drop_non_existing_groups = drop;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::Configuration` if:
    /// - `groups_dn`, the membership attribute or the name attribute is empty
    /// - no group object class is configured
    /// - inheritance is preserved with `UID` membership
    pub fn build(self) -> FederationResult<GroupMapperConfig> {
        let mut config = self.config;

        if config.groups_dn.trim().is_empty() {
            return Err(FederationError::config("groups_dn cannot be empty"));
        }
        if config.membership_attribute.trim().is_empty() {
            return Err(FederationError::config("membership_attribute cannot be empty"));
        }
        if config.group_name_attribute.trim().is_empty() {
            return Err(FederationError::config("group_name_attribute cannot be empty"));
        }
        if config.group_object_classes.is_empty() {
            return Err(FederationError::config("group_object_classes cannot be empty"));
        }
        if config.preserve_group_inheritance && config.membership_type == MembershipType::Uid {
            return Err(FederationError::config(
                "Group inheritance cannot be preserved with UID membership",
            ));
        }

        let path = config.groups_path.trim();
        config.groups_path = if path.is_empty() || path == "/" {
            "/".to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Ok(config)
    }
}
