//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::sync::Arc;

use kc_federation::{GroupMapperConfig, GroupMapperConfigBuilder, GroupMapperMode};
use kc_federation_ldap::{GroupLdapMapper, InMemoryDirectory};
use kc_model::{Group, User};
use kc_storage::InMemoryStore;
use uuid::Uuid;

pub const USERS_DN: &str = "ou=People,dc=keycloak,dc=org";
pub const GROUPS_DN: &str = "ou=Groups,dc=keycloak,dc=org";
pub const PROVIDER: &str = "test-ldap";

/// Directory and local store shared by the mappers of one test.
///
/// Directory layout:
///
/// ```text
/// group1   members: group11, group12, marykeycloak
/// group11  members: johnkeycloak
/// group12  members: (none)
/// group2   members: (none)
/// ```
pub struct TestEnv {
    pub realm: Uuid,
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryStore>,
    pub john_dn: String,
    pub mary_dn: String,
    pub rob_dn: String,
}

impl TestEnv {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("kc_federation_ldap=debug,kc_storage=info")
            .with_test_writer()
            .try_init();

        let directory = Arc::new(InMemoryDirectory::new(USERS_DN));
        let john_dn = directory.add_user("johnkeycloak", "John", "Doe");
        let mary_dn = directory.add_user("marykeycloak", "Mary", "Kelly");
        let rob_dn = directory.add_user("robkeycloak", "Rob", "Brown");

        let group11 = directory.add_group(GROUPS_DN, "group11", &[john_dn.clone()]);
        let group12 = directory.add_group(GROUPS_DN, "group12", &[]);
        directory.add_group(GROUPS_DN, "group1", &[group11, group12, mary_dn.clone()]);
        directory.add_group(GROUPS_DN, "group2", &[]);

        Self {
            realm: Uuid::now_v7(),
            directory,
            store: Arc::new(InMemoryStore::new()),
            john_dn,
            mary_dn,
            rob_dn,
        }
    }

    pub fn group_dn(name: &str) -> String {
        format!("cn={name},{GROUPS_DN}")
    }

    pub fn mapper(&self, mode: GroupMapperMode) -> GroupLdapMapper {
        self.mapper_with(GroupMapperConfig::builder(GROUPS_DN).mode(mode))
    }

    pub fn mapper_with(&self, builder: GroupMapperConfigBuilder) -> GroupLdapMapper {
        let config = builder.build().expect("valid mapper config");
        GroupLdapMapper::new(
            PROVIDER,
            config,
            self.directory.clone(),
            self.store.clone(),
        )
    }

    /// Directory member values of a group, excluding nested groups.
    pub fn member_values(&self, group: &str) -> Vec<String> {
        self.directory
            .get(&Self::group_dn(group))
            .and_then(|e| e.get_attrs("member").cloned())
            .unwrap_or_default()
    }
}

pub fn names(groups: &[Group]) -> Vec<String> {
    let mut names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    names.sort();
    names
}

pub fn usernames(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.username.as_str()).collect()
}
