//! Group LDAP mapper.
//!
//! Binds one directory group subtree (`groups.dn`) to one local group
//! subtree (`groups.path`) and routes membership reads and writes according
//! to the configured [`GroupMapperMode`].
//!
//! A local group belongs to the mapper when it lies strictly below the
//! groups path and a directory group exists at the same relative path.
//! Every other group, including ones created locally inside the mapper
//! subtree, is read and written through the local store only.

use std::collections::HashSet;
use std::sync::Arc;

use kc_federation::{
    FederationError, FederationMapper, FederationResult, GroupMapperConfig, GroupMapperMode,
    JoinAction, LeaveAction, MapperConfig,
};
use kc_model::{Group, GroupPath, GroupTree, MembershipEdge, MembershipOrigin, User};
use kc_storage::{GroupProvider, LocalStore, MembershipProvider, UserProvider};
use uuid::Uuid;

use crate::adapter::{DirectoryGroupAdapter, DirectoryUser, MemberResolution};
use crate::directory::LdapDirectory;
use crate::tree::{DirectoryGroupTree, MappedGroup};

// ============================================================================
// Mapper Scope
// ============================================================================

/// The local and directory views of a mapper's groups in one realm.
pub(crate) struct MapperScope {
    /// Local group at the groups path, `None` for the top level.
    pub(crate) root: Option<Group>,
    /// Segment path of the groups path.
    pub(crate) root_path: GroupPath,
    /// Local group tree of the realm.
    pub(crate) local: GroupTree,
    /// Directory groups of the mapper.
    pub(crate) directory: DirectoryGroupTree,
}

impl MapperScope {
    /// Returns the path of a local group relative to the groups path.
    ///
    /// `None` unless the group lies strictly below the groups path.
    pub(crate) fn relative_path(&self, group_id: Uuid) -> Option<GroupPath> {
        let full = self.local.path_of(group_id)?;
        let depth = self.root_path.depth();
        if full.depth() <= depth || !full.starts_with(&self.root_path) {
            return None;
        }
        Some(GroupPath::from_segments(full.segments[depth..].iter().cloned()))
    }

    /// Returns the directory group backing a local group, if any.
    pub(crate) fn directory_group(&self, group_id: Uuid) -> Option<&MappedGroup> {
        self.relative_path(group_id)
            .and_then(|path| self.directory.by_path(&path))
    }
}

// ============================================================================
// Group LDAP Mapper
// ============================================================================

/// Maps directory groups onto local groups for one federation provider.
///
/// The mode is fixed for the lifetime of a mapper. Reconfiguring means
/// building a new mapper with [`GroupLdapMapper::with_config`]; operations
/// already running keep the old configuration.
#[derive(Clone)]
pub struct GroupLdapMapper {
    provider_id: String,
    config: Arc<GroupMapperConfig>,
    adapter: DirectoryGroupAdapter,
    store: Arc<dyn LocalStore>,
}

impl GroupLdapMapper {
    /// Creates a mapper.
    ///
    /// `provider_id` is the federation link written on imported users.
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        config: GroupMapperConfig,
        directory: Arc<dyn LdapDirectory>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            provider_id: provider_id.into(),
            adapter: DirectoryGroupAdapter::new(directory, config.clone()),
            config,
            store,
        }
    }

    /// Returns a mapper over the same directory and store with a new configuration.
    #[must_use]
    pub fn with_config(&self, config: GroupMapperConfig) -> Self {
        tracing::info!(
            provider = %self.provider_id,
            from = %self.config.mode,
            to = %config.mode,
            "Reconfiguring group mapper"
        );
        Self::new(
            self.provider_id.clone(),
            config,
            self.adapter.directory().clone(),
            self.store.clone(),
        )
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GroupMapperConfig {
        &self.config
    }

    /// Returns the mode.
    #[must_use]
    pub fn mode(&self) -> GroupMapperMode {
        self.config.mode
    }

    /// Returns the directory adapter.
    #[must_use]
    pub fn adapter(&self) -> &DirectoryGroupAdapter {
        &self.adapter
    }

    /// Returns the local store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Lists the groups of a user as seen through this mapper.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the mode reads the directory and it
    /// cannot be reached.
    pub async fn get_groups_for_user(&self, realm_id: Uuid, user: &User) -> FederationResult<Vec<Group>> {
        let edges = self.membership_edges(realm_id, user).await?;
        let mut groups = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(group) = self.store.get_by_id(realm_id, edge.group_id).await? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Lists the membership edges of a user, each tagged with its origin.
    ///
    /// Local edges come first; a directory membership already covered by a
    /// local edge is not repeated.
    ///
    /// ## Errors
    ///
    /// Returns `DirectoryUnavailable` if the mode reads the directory and it
    /// cannot be reached.
    pub async fn membership_edges(&self, realm_id: Uuid, user: &User) -> FederationResult<Vec<MembershipEdge>> {
        let sources = self.config.mode.read_sources();
        let local_edges = self.store.get_user_memberships(realm_id, user.id).await?;
        if !sources.directory {
            return Ok(local_edges);
        }

        let mut scope = self.scope(realm_id).await?;
        let mut edges: Vec<MembershipEdge> = local_edges
            .into_iter()
            .filter(|e| sources.local || scope.directory_group(e.group_id).is_none())
            .collect();

        let Some(directory_user) = self.directory_user(user).await? else {
            return Ok(edges);
        };
        let groups = self
            .adapter
            .list_groups_for_user(&directory_user, self.config.retrieve_strategy)
            .await?;
        for group in groups {
            let Some(path) = scope.directory.by_dn(&group.dn).map(|m| m.path.clone()) else {
                continue;
            };
            let (local, _) = self.ensure_local_group(realm_id, &mut scope, &path).await?;
            if !edges.iter().any(|e| e.group_id == local.id) {
                edges.push(MembershipEdge::directory(user.id, local.id));
            }
        }
        Ok(edges)
    }

    /// Lists members of a group, ordered by username.
    ///
    /// Directory members not yet known locally are imported. Member
    /// references that resolve to nothing are skipped.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the group doesn't exist and
    /// `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn get_members(
        &self,
        realm_id: Uuid,
        group_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> FederationResult<Vec<User>> {
        let group = self.load_group(realm_id, group_id).await?;
        let sources = self.config.mode.read_sources();

        let directory_group = if sources.directory {
            let scope = self.scope(realm_id).await?;
            scope.directory_group(group.id).map(|m| m.group.clone())
        } else {
            None
        };

        let mut users: Vec<User> = Vec::new();
        if sources.local || directory_group.is_none() {
            for edge in self.store.get_members(realm_id, group.id, None, None).await? {
                if let Some(user) = self.store.get_user_by_id(realm_id, edge.user_id).await? {
                    users.push(user);
                }
            }
        }

        if let Some(directory_group) = directory_group {
            for value in self.adapter.list_members(&directory_group) {
                match self.adapter.resolve_member(&value).await? {
                    MemberResolution::User(member) => {
                        let (user, _) = self.ensure_local_user(realm_id, &member).await?;
                        users.push(user);
                    }
                    MemberResolution::Group(_) => {}
                    MemberResolution::Dangling => {
                        tracing::debug!(
                            group = %directory_group.name,
                            member = %value,
                            "Skipping dangling member reference"
                        );
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        users.retain(|u| seen.insert(u.id));
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    /// Resolves a local group path.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the path does not resolve.
    pub async fn group_by_path(&self, realm_id: Uuid, path: &str) -> FederationResult<Group> {
        self.store
            .get_by_path(realm_id, path)
            .await?
            .ok_or_else(|| FederationError::group_not_found(path))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Adds a user to a group.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the user or group doesn't exist and
    /// `DirectoryUnavailable` if a directory write fails to connect.
    pub async fn join_group(&self, realm_id: Uuid, user_id: Uuid, group_id: Uuid) -> FederationResult<()> {
        let user = self.load_user(realm_id, user_id).await?;
        let group = self.load_group(realm_id, group_id).await?;

        let directory_group = match self.config.mode.join_action() {
            JoinAction::AddLocalEdge => None,
            JoinAction::AddDirectoryLink => {
                let scope = self.scope(realm_id).await?;
                scope.directory_group(group.id).map(|m| m.group.clone())
            }
        };

        match directory_group {
            Some(directory_group) => {
                let member = self.adapter.load_user_by_username(&user.username).await?;
                self.adapter
                    .add_membership_link(&directory_group, &member)
                    .await?;
            }
            None => {
                self.store
                    .add_member(realm_id, user.id, group.id, MembershipOrigin::Local)
                    .await?;
            }
        }

        tracing::debug!(user = %user.username, group = %group.name, mode = ?self.config.mode, "Joined group");
        Ok(())
    }

    /// Removes a user from a group.
    ///
    /// ## Errors
    ///
    /// Returns `PolicyViolation` in `READ_ONLY` mode when the membership
    /// comes from the directory, `NotFound` if the user or group doesn't
    /// exist and `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn leave_group(&self, realm_id: Uuid, user_id: Uuid, group_id: Uuid) -> FederationResult<()> {
        let user = self.load_user(realm_id, user_id).await?;
        let group = self.load_group(realm_id, group_id).await?;
        let mode = self.config.mode;

        let directory_group = if mode.read_sources().directory {
            let scope = self.scope(realm_id).await?;
            scope.directory_group(group.id).map(|m| m.group.clone())
        } else {
            None
        };
        let Some(directory_group) = directory_group else {
            self.store.remove_member(realm_id, user.id, group.id).await?;
            tracing::debug!(user = %user.username, group = %group.name, "Left local group");
            return Ok(());
        };

        let member = self.directory_user(&user).await?;
        let directory_linked = member
            .as_ref()
            .is_some_and(|m| self.adapter.has_member(&directory_group, m));

        let action = match mode.leave_action(directory_linked) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(
                    user = %user.username,
                    group = %group.name,
                    mode = ?mode,
                    "Refusing to remove directory membership"
                );
                return Err(e);
            }
        };

        match (action, member) {
            (LeaveAction::RemoveLocalEdge, _) => {
                self.store.remove_member(realm_id, user.id, group.id).await?;
            }
            (LeaveAction::RemoveDirectoryLink, Some(member)) => {
                self.adapter
                    .remove_membership_link(&directory_group, &member)
                    .await?;
            }
            (LeaveAction::RemoveDirectoryLink, None) => {}
        }

        tracing::debug!(user = %user.username, group = %group.name, mode = ?mode, "Left group");
        Ok(())
    }

    /// Imports a directory user into the local store.
    ///
    /// An existing local user is returned unchanged. In `IMPORT` mode a
    /// newly created user also receives local edges for its directory
    /// groups.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the user is not in the directory and
    /// `DirectoryUnavailable` if the directory cannot be reached.
    pub async fn import_user(&self, realm_id: Uuid, username: &str) -> FederationResult<User> {
        let member = self.adapter.load_user_by_username(username).await?;
        let (user, created) = self.ensure_local_user(realm_id, &member).await?;
        if !created || !self.config.mode.imports_memberships() {
            return Ok(user);
        }

        let mut scope = self.scope(realm_id).await?;
        let groups = self
            .adapter
            .list_groups_for_user(&member, self.config.retrieve_strategy)
            .await?;
        for group in groups {
            let Some(path) = scope.directory.by_dn(&group.dn).map(|m| m.path.clone()) else {
                continue;
            };
            let (local, _) = self.ensure_local_group(realm_id, &mut scope, &path).await?;
            self.store
                .add_member(realm_id, user.id, local.id, MembershipOrigin::Directory)
                .await?;
        }
        Ok(user)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Loads the local and directory views of the mapper.
    pub(crate) async fn scope(&self, realm_id: Uuid) -> FederationResult<MapperScope> {
        let local = self.store.get_tree(realm_id).await?;
        let (root, root_path) = self.groups_path_root(&local)?;
        let groups = self.adapter.all_groups().await?;
        let directory = DirectoryGroupTree::build(groups, self.config.preserve_group_inheritance)?;
        Ok(MapperScope {
            root,
            root_path,
            local,
            directory,
        })
    }

    fn groups_path_root(&self, local: &GroupTree) -> FederationResult<(Option<Group>, GroupPath)> {
        let groups_path = &self.config.groups_path;
        if groups_path == "/" {
            return Ok((None, GroupPath::root()));
        }
        let node = local.resolve(groups_path).ok_or_else(|| {
            FederationError::config(format!("Group path '{groups_path}' does not exist"))
        })?;
        let path = local.path_of(node.id()).unwrap_or_default();
        Ok((Some(node.group.clone()), path))
    }

    /// Returns the local group at `relative` below the groups path, creating
    /// missing groups along the way. The flag tells whether any was created.
    pub(crate) async fn ensure_local_group(
        &self,
        realm_id: Uuid,
        scope: &mut MapperScope,
        relative: &GroupPath,
    ) -> FederationResult<(Group, bool)> {
        let mut parent = scope.root.clone();
        let mut path = scope.root_path.clone();
        let mut created = false;

        for segment in &relative.segments {
            path = path.child(segment.clone());
            let group = match scope.local.find_by_segments(&path) {
                Some(node) => node.group.clone(),
                None => {
                    let group = match &parent {
                        Some(p) => Group::new_child(realm_id, p.id, segment.clone()),
                        None => Group::new(realm_id, segment.clone()),
                    };
                    self.store.create(&group).await?;
                    scope.local = self.store.get_tree(realm_id).await?;
                    created = true;
                    tracing::debug!(group = %path, "Created local group for directory group");
                    group
                }
            };
            parent = Some(group);
        }

        parent
            .filter(|_| !relative.is_root())
            .map(|group| (group, created))
            .ok_or_else(|| FederationError::Internal("empty directory group path".to_string()))
    }

    /// Returns the local user for a directory user, importing it if needed.
    pub(crate) async fn ensure_local_user(
        &self,
        realm_id: Uuid,
        member: &DirectoryUser,
    ) -> FederationResult<(User, bool)> {
        if let Some(user) = self
            .store
            .get_user_by_username(realm_id, &member.username)
            .await?
        {
            return Ok((user, false));
        }

        let user = member.to_local_user(realm_id, &self.provider_id);
        self.store.create_user(&user).await?;
        tracing::debug!(username = %user.username, dn = %member.dn, "Imported directory user");
        Ok((user, true))
    }

    /// Finds the directory entry of a local user linked to this provider.
    async fn directory_user(&self, user: &User) -> FederationResult<Option<DirectoryUser>> {
        if !user.is_linked_to(&self.provider_id) {
            return Ok(None);
        }
        self.adapter.find_user_by_username(&user.username).await
    }

    async fn load_user(&self, realm_id: Uuid, user_id: Uuid) -> FederationResult<User> {
        self.store
            .get_user_by_id(realm_id, user_id)
            .await?
            .ok_or_else(|| FederationError::user_not_found(user_id.to_string()))
    }

    async fn load_group(&self, realm_id: Uuid, group_id: Uuid) -> FederationResult<Group> {
        self.store
            .get_by_id(realm_id, group_id)
            .await?
            .ok_or_else(|| FederationError::group_not_found(group_id.to_string()))
    }
}

impl FederationMapper for GroupLdapMapper {
    fn mapper_type(&self) -> &'static str {
        GroupMapperConfig::MAPPER_TYPE
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn describe(&self, name: &str) -> MapperConfig {
        let mut config = MapperConfig::new(name, self.mapper_type(), self.provider_id.as_str());
        self.config.apply_to(&mut config);
        config
    }
}

impl std::fmt::Debug for GroupLdapMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupLdapMapper")
            .field("provider_id", &self.provider_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
