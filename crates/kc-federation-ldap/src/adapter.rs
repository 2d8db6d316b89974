//! Directory group adapter.
//!
//! Wraps an [`LdapDirectory`] with the group mapper's view of it: which
//! entries are groups, how members are referenced, and how the membership
//! attribute is kept valid for `groupOfNames` (which requires at least one
//! member, hence the placeholder value).

use std::sync::Arc;

use kc_federation::{
    FederationError, FederationResult, GroupMapperConfig, MembershipRetrieveStrategy,
    MembershipType,
};
use kc_model::{User, LDAP_ID};

use crate::directory::{GroupQuery, LdapDirectory};
use crate::dn;
use crate::entry::LdapEntry;
use crate::strategy;

/// Member value written when the last real member is removed.
pub const EMPTY_MEMBER_PLACEHOLDER: &str = "cn=empty-membership-placeholder";

/// A group entry as seen by the mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    /// Entry DN.
    pub dn: String,
    /// Group name.
    pub name: String,
    /// Raw membership values, placeholder excluded.
    pub members: Vec<String>,
    /// The full entry.
    pub entry: LdapEntry,
}

/// A user entry as seen by the mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// Entry DN.
    pub dn: String,
    /// Username.
    pub username: String,
    /// Stable directory identifier, if the entry carries one.
    pub external_id: Option<String>,
    /// The full entry.
    pub entry: LdapEntry,
}

impl DirectoryUser {
    /// Builds a local user linked to this entry.
    #[must_use]
    pub fn to_local_user(&self, realm_id: uuid::Uuid, provider_id: &str) -> User {
        let mut user = User::new(realm_id, &self.username).linked(provider_id, &self.dn);
        user.email = self.entry.get_attr("mail").map(String::from);
        user.first_name = self.entry.get_attr("givenName").map(String::from);
        user.last_name = self.entry.get_attr("sn").map(String::from);
        if let Some(external_id) = &self.external_id {
            user.set_attribute(LDAP_ID, vec![external_id.clone()]);
        }
        user
    }
}

/// What a raw membership value points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberResolution {
    /// A user entry.
    User(DirectoryUser),
    /// A nested group entry.
    Group(DirectoryGroup),
    /// Nothing: the referenced entry does not exist.
    Dangling,
}

/// Capability surface over the directory for one group mapper.
#[derive(Clone)]
pub struct DirectoryGroupAdapter {
    directory: Arc<dyn LdapDirectory>,
    config: Arc<GroupMapperConfig>,
}

impl DirectoryGroupAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(directory: Arc<dyn LdapDirectory>, config: Arc<GroupMapperConfig>) -> Self {
        Self { directory, config }
    }

    /// Returns the mapper configuration.
    #[must_use]
    pub fn config(&self) -> &GroupMapperConfig {
        &self.config
    }

    /// Returns the underlying directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn LdapDirectory> {
        &self.directory
    }

    fn query(&self) -> GroupQuery {
        GroupQuery::new(
            self.config.groups_dn.clone(),
            self.config.group_object_classes.clone(),
        )
    }

    /// Interprets an entry as a group of this mapper.
    #[must_use]
    pub fn to_group(&self, entry: LdapEntry) -> DirectoryGroup {
        let name = entry
            .get_attr(&self.config.group_name_attribute)
            .map(String::from)
            .or_else(|| dn::rdn_value(&entry.dn, &self.config.group_name_attribute))
            .unwrap_or_else(|| entry.dn.clone());
        let members = entry
            .get_attrs(&self.config.membership_attribute)
            .map(|values| {
                values
                    .iter()
                    .filter(|v| !dn::dn_eq(v, EMPTY_MEMBER_PLACEHOLDER))
                    .filter(|v| !v.trim().is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        DirectoryGroup {
            dn: entry.dn.clone(),
            name,
            members,
            entry,
        }
    }

    fn to_user(&self, entry: LdapEntry) -> Option<DirectoryUser> {
        let username = entry.get_attr(self.directory.username_attribute())?.to_string();
        let external_id = entry.external_id(self.directory.uuid_attribute());
        Some(DirectoryUser {
            dn: entry.dn.clone(),
            username,
            external_id,
            entry,
        })
    }

    fn is_group_entry(&self, entry: &LdapEntry) -> bool {
        dn::is_within(&entry.dn, &self.config.groups_dn)
            && entry.has_object_classes(&self.config.group_object_classes)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Lists every group below the groups DN.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn all_groups(&self) -> FederationResult<Vec<DirectoryGroup>> {
        let entries = self.directory.search_groups(&self.query()).await?;
        Ok(entries.into_iter().map(|e| self.to_group(e)).collect())
    }

    /// Finds a group by name, if present.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn find_group_by_name(&self, name: &str) -> FederationResult<Option<DirectoryGroup>> {
        let query = self
            .query()
            .with_equals(self.config.group_name_attribute.clone(), name);
        let entries = self.directory.search_groups(&query).await?;
        // Equality matching is case-insensitive; prefer the exact spelling.
        let mut groups: Vec<DirectoryGroup> = entries.into_iter().map(|e| self.to_group(e)).collect();
        let exact = groups.iter().position(|g| g.name == name);
        Ok(match exact {
            Some(i) => Some(groups.swap_remove(i)),
            None => groups.into_iter().next(),
        })
    }

    /// Loads a group by name.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if no such group exists.
    pub async fn load_group_by_name(&self, name: &str) -> FederationResult<DirectoryGroup> {
        self.find_group_by_name(name)
            .await?
            .ok_or_else(|| FederationError::group_not_found(name))
    }

    /// Loads a user by username.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if no such user exists.
    pub async fn load_user_by_username(&self, username: &str) -> FederationResult<DirectoryUser> {
        self.find_user_by_username(username)
            .await?
            .ok_or_else(|| FederationError::user_not_found(username))
    }

    /// Finds a user by username, if present.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> FederationResult<Option<DirectoryUser>> {
        let entry = self.directory.find_user(username).await?;
        Ok(entry.and_then(|e| self.to_user(e)))
    }

    /// Reads a group by DN, if it is a group of this mapper.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn lookup_group(&self, group_dn: &str) -> FederationResult<Option<DirectoryGroup>> {
        let entry = self.directory.lookup(group_dn).await?;
        Ok(entry
            .filter(|e| self.is_group_entry(e))
            .map(|e| self.to_group(e)))
    }

    // ========================================================================
    // Membership links
    // ========================================================================

    /// Returns the membership value referencing a user.
    #[must_use]
    pub fn membership_value(&self, user: &DirectoryUser) -> String {
        match self.config.membership_type {
            MembershipType::Dn => user.dn.clone(),
            MembershipType::Uid => user.username.clone(),
        }
    }

    /// Checks whether a group lists the user as a member.
    #[must_use]
    pub fn has_member(&self, group: &DirectoryGroup, user: &DirectoryUser) -> bool {
        let value = self.membership_value(user);
        group.members.iter().any(|m| match self.config.membership_type {
            MembershipType::Dn => dn::dn_eq(m, &value),
            MembershipType::Uid => m.eq_ignore_ascii_case(&value),
        })
    }

    /// Adds the user to the group. Adding an existing link is a no-op.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the group vanished and `DirectoryUnavailable`
    /// if the directory cannot be reached.
    pub async fn add_membership_link(
        &self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> FederationResult<()> {
        let current = self.fresh(group).await?;
        if self.has_member(&current, user) {
            return Ok(());
        }

        let attr = &self.config.membership_attribute;
        self.directory
            .add_value(&current.dn, attr, &self.membership_value(user))
            .await?;

        if self.has_placeholder(&current) {
            self.directory
                .remove_value(&current.dn, attr, EMPTY_MEMBER_PLACEHOLDER)
                .await?;
        }

        tracing::debug!(group = %current.name, user = %user.username, "Added LDAP membership");
        Ok(())
    }

    /// Removes the user from the group. Removing an absent link is a no-op.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the group vanished and `DirectoryUnavailable`
    /// if the directory cannot be reached.
    pub async fn remove_membership_link(
        &self,
        group: &DirectoryGroup,
        user: &DirectoryUser,
    ) -> FederationResult<()> {
        let current = self.fresh(group).await?;
        if !self.has_member(&current, user) {
            return Ok(());
        }

        let attr = &self.config.membership_attribute;
        let value = current
            .members
            .iter()
            .find(|m| match self.config.membership_type {
                MembershipType::Dn => dn::dn_eq(m, &user.dn),
                MembershipType::Uid => m.eq_ignore_ascii_case(&user.username),
            })
            .cloned()
            .unwrap_or_else(|| self.membership_value(user));

        // groupOfNames needs at least one member value.
        if current.members.len() == 1 && self.config.membership_type == MembershipType::Dn {
            self.directory
                .add_value(&current.dn, attr, EMPTY_MEMBER_PLACEHOLDER)
                .await?;
        }
        self.directory.remove_value(&current.dn, attr, &value).await?;

        tracing::debug!(group = %current.name, user = %user.username, "Removed LDAP membership");
        Ok(())
    }

    /// Lists the raw member references of a group.
    ///
    /// References to entries that no longer exist are included.
    #[must_use]
    pub fn list_members(&self, group: &DirectoryGroup) -> Vec<String> {
        group.members.clone()
    }

    /// Resolves one raw member reference.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn resolve_member(&self, value: &str) -> FederationResult<MemberResolution> {
        let entry = match self.config.membership_type {
            MembershipType::Dn => self.directory.lookup(value).await?,
            MembershipType::Uid => self.directory.find_user(value).await?,
        };
        let Some(entry) = entry else {
            return Ok(MemberResolution::Dangling);
        };

        if self.is_group_entry(&entry) {
            return Ok(MemberResolution::Group(self.to_group(entry)));
        }
        Ok(self
            .to_user(entry)
            .map_or(MemberResolution::Dangling, MemberResolution::User))
    }

    /// Lists the directory groups of a user using the given strategy.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn list_groups_for_user(
        &self,
        user: &DirectoryUser,
        strategy: MembershipRetrieveStrategy,
    ) -> FederationResult<Vec<DirectoryGroup>> {
        strategy::groups_for_user(self, user, strategy).await
    }

    /// Runs a member-attribute search for `value`.
    pub(crate) async fn groups_with_member(&self, value: &str) -> FederationResult<Vec<DirectoryGroup>> {
        let query = self
            .query()
            .with_equals(self.config.membership_attribute.clone(), value);
        let entries = self.directory.search_groups(&query).await?;
        Ok(entries.into_iter().map(|e| self.to_group(e)).collect())
    }

    async fn fresh(&self, group: &DirectoryGroup) -> FederationResult<DirectoryGroup> {
        self.lookup_group(&group.dn)
            .await?
            .ok_or_else(|| FederationError::group_not_found(group.name.clone()))
    }

    fn has_placeholder(&self, group: &DirectoryGroup) -> bool {
        group
            .entry
            .get_attrs(&self.config.membership_attribute)
            .is_some_and(|values| values.iter().any(|v| dn::dn_eq(v, EMPTY_MEMBER_PLACEHOLDER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDirectory;

    const USERS_DN: &str = "ou=People,dc=keycloak,dc=org";
    const GROUPS_DN: &str = "ou=Groups,dc=keycloak,dc=org";

    fn setup() -> (Arc<InMemoryDirectory>, DirectoryGroupAdapter) {
        let directory = Arc::new(InMemoryDirectory::new(USERS_DN));
        let config = GroupMapperConfig::builder(GROUPS_DN).build().unwrap();
        let adapter = DirectoryGroupAdapter::new(directory.clone(), Arc::new(config));
        (directory, adapter)
    }

    #[tokio::test]
    async fn loads_groups_and_users() {
        let (dir, adapter) = setup();
        let john = dir.add_user("johnkeycloak", "John", "Doe");
        dir.add_group(GROUPS_DN, "Team 2016/2017", &[john.clone()]);

        let group = adapter.load_group_by_name("Team 2016/2017").await.unwrap();
        assert_eq!(group.members, vec![john]);

        let user = adapter.load_user_by_username("johnkeycloak").await.unwrap();
        assert!(adapter.has_member(&group, &user));

        assert!(adapter.load_group_by_name("nope").await.unwrap_err().is_not_found());
        assert!(adapter.load_user_by_username("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn links_are_idempotent_and_keep_placeholder_rules() {
        let (dir, adapter) = setup();
        dir.add_user("johnkeycloak", "John", "Doe");
        let group_dn = dir.add_group(GROUPS_DN, "group1", &[]);
        let group = adapter.load_group_by_name("group1").await.unwrap();
        let john = adapter.load_user_by_username("johnkeycloak").await.unwrap();

        adapter.add_membership_link(&group, &john).await.unwrap();
        adapter.add_membership_link(&group, &john).await.unwrap();
        let members = dir.get(&group_dn).unwrap().get_attrs("member").cloned();
        assert_eq!(members, Some(vec![john.dn.clone()]));

        adapter.remove_membership_link(&group, &john).await.unwrap();
        adapter.remove_membership_link(&group, &john).await.unwrap();
        let members = dir.get(&group_dn).unwrap().get_attrs("member").cloned();
        assert_eq!(members, Some(vec![EMPTY_MEMBER_PLACEHOLDER.to_string()]));

        let group = adapter.load_group_by_name("group1").await.unwrap();
        assert!(adapter.list_members(&group).is_empty());

        adapter.add_membership_link(&group, &john).await.unwrap();
        let members = dir.get(&group_dn).unwrap().get_attrs("member").cloned();
        assert_eq!(members, Some(vec![john.dn]));
    }

    #[tokio::test]
    async fn list_members_keeps_dangling_references() {
        let (dir, adapter) = setup();
        let john = dir.add_user("johnkeycloak", "John", "Doe");
        let ghost = "uid=ghost,ou=People,dc=keycloak,dc=org".to_string();
        dir.add_group(GROUPS_DN, "group1", &[john, ghost.clone()]);

        let group = adapter.load_group_by_name("group1").await.unwrap();
        let members = adapter.list_members(&group);
        assert_eq!(members.len(), 2);

        assert!(matches!(
            adapter.resolve_member(&members[0]).await.unwrap(),
            MemberResolution::User(_)
        ));
        assert_eq!(
            adapter.resolve_member(&ghost).await.unwrap(),
            MemberResolution::Dangling
        );
    }

    #[tokio::test]
    async fn nested_groups_resolve_as_groups() {
        let (dir, adapter) = setup();
        let child = dir.add_group(GROUPS_DN, "group11", &[]);
        dir.add_group(GROUPS_DN, "group1", &[child.clone()]);

        match adapter.resolve_member(&child).await.unwrap() {
            MemberResolution::Group(g) => assert_eq!(g.name, "group11"),
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_directory_propagates() {
        let (dir, adapter) = setup();
        dir.set_available(false);

        let err = adapter.all_groups().await.unwrap_err();
        assert!(err.is_directory_unavailable());
    }

    #[test]
    fn local_user_carries_directory_profile() {
        let user = DirectoryUser {
            dn: "uid=mary,ou=People,dc=keycloak,dc=org".to_string(),
            username: "mary".to_string(),
            external_id: Some("6f1c2a".to_string()),
            entry: LdapEntry::new("uid=mary,ou=People,dc=keycloak,dc=org")
                .with_attr("mail", ["mary@email.org"])
                .with_attr("givenName", ["Mary"]),
        };

        let local = user.to_local_user(uuid::Uuid::now_v7(), "ldap");
        assert_eq!(local.email.as_deref(), Some("mary@email.org"));
        assert!(local.is_linked_to("ldap"));
        assert_eq!(
            local.directory_dn(),
            Some("uid=mary,ou=People,dc=keycloak,dc=org")
        );
        assert_eq!(local.get_first_attribute(LDAP_ID), Some("6f1c2a"));
    }
}
