//! Directory to local group synchronization.
//!
//! A pass walks the directory group tree parents first, creates missing
//! local groups, copies mapped attributes, imports referenced users and, in
//! `IMPORT` mode, stores memberships as local edges. Member references that
//! resolve to nothing are counted and skipped. Re-running a pass without
//! directory changes changes nothing.
//!
//! Each group is written once, together with its new edges, so a reader
//! running alongside the pass sees the group either as it was or fully
//! synced.

use std::collections::HashSet;

use chrono::Utc;
use kc_federation::{FederationError, FederationResult, GroupSynchronization, SyncError, SyncResult};
use kc_model::{Group, GroupPath, MembershipOrigin};
use uuid::Uuid;

use crate::adapter::{DirectoryGroup, MemberResolution};
use crate::mapper::{GroupLdapMapper, MapperScope};
use crate::tree::MappedGroup;

impl GroupSynchronization for GroupLdapMapper {
    async fn sync_data_from_directory(&self, realm_id: Uuid) -> FederationResult<SyncResult> {
        let mut result = SyncResult::new(Utc::now());
        let mut scope = self.scope(realm_id).await?;

        tracing::info!(
            realm = %realm_id,
            groups_dn = %self.config().groups_dn,
            mode = ?self.mode(),
            groups = scope.directory.len(),
            "Starting group sync"
        );

        let entries: Vec<MappedGroup> = scope.directory.entries().to_vec();
        for entry in &entries {
            match self.sync_group(realm_id, &mut scope, entry, &mut result).await {
                Ok(()) => {}
                Err(e) if e.is_directory_unavailable() => return Err(e),
                Err(e) => {
                    tracing::warn!(dn = %entry.group.dn, error = %e, "Failed to sync group");
                    result.record_failure(
                        SyncError::new(&entry.group.dn, e.to_string())
                            .with_group_name(&entry.group.name),
                    );
                }
            }
        }

        if self.config().drop_non_existing_groups {
            self.drop_missing_groups(realm_id, &scope, &mut result)
                .await?;
        }

        let result = result.complete();
        tracing::info!(
            realm = %realm_id,
            added = result.added,
            updated = result.updated,
            removed = result.removed,
            memberships = result.memberships_imported,
            dangling = result.dangling_skipped,
            failed = result.failed,
            "Group sync finished"
        );
        Ok(result)
    }
}

impl GroupLdapMapper {
    async fn sync_group(
        &self,
        realm_id: Uuid,
        scope: &mut MapperScope,
        entry: &MappedGroup,
        result: &mut SyncResult,
    ) -> FederationResult<()> {
        let (mut group, created) = self.local_group_for_sync(realm_id, scope, &entry.path).await?;
        let changed = self.copy_mapped_attributes(&mut group, &entry.group);
        if changed && !created {
            group.updated_at = Utc::now();
        }

        let imports = self.mode().imports_memberships();
        let mut members = Vec::new();
        for value in self.adapter().list_members(&entry.group) {
            match self.adapter().resolve_member(&value).await? {
                MemberResolution::User(member) => {
                    let (user, _) = self.ensure_local_user(realm_id, &member).await?;
                    if imports {
                        members.push((user.id, MembershipOrigin::Directory));
                    }
                }
                MemberResolution::Group(_) => {}
                MemberResolution::Dangling => {
                    result.record_dangling();
                    tracing::debug!(
                        group = %entry.path,
                        member = %value,
                        "Skipping dangling member reference"
                    );
                }
            }
        }

        let added = self
            .store()
            .save_group_with_members(&group, &members)
            .await?;
        for _ in 0..added {
            result.record_membership();
        }

        if created {
            result.record_added();
            scope.local = self.store().get_tree(realm_id).await?;
            tracing::debug!(group = %entry.path, members = added, "Created local group for directory group");
        } else if changed {
            result.record_updated();
        }
        Ok(())
    }

    /// Returns the local group at `relative`, or a new unsaved one if there
    /// is none yet. Missing ancestors are created. The flag tells whether the
    /// group is new.
    async fn local_group_for_sync(
        &self,
        realm_id: Uuid,
        scope: &mut MapperScope,
        relative: &GroupPath,
    ) -> FederationResult<(Group, bool)> {
        let mut path = scope.root_path.clone();
        for segment in &relative.segments {
            path = path.child(segment.clone());
        }
        if let Some(node) = scope.local.find_by_segments(&path) {
            return Ok((node.group.clone(), false));
        }

        let name = relative
            .leaf()
            .ok_or_else(|| FederationError::Internal("empty directory group path".to_string()))?;
        let parent = match relative.parent() {
            Some(parent) if !parent.is_root() => {
                Some(self.ensure_local_group(realm_id, scope, &parent).await?.0)
            }
            _ => scope.root.clone(),
        };
        let group = match parent {
            Some(p) => Group::new_child(realm_id, p.id, name),
            None => Group::new(realm_id, name),
        };
        Ok((group, true))
    }

    /// Copies the mapped directory attributes onto `group`; true if anything changed.
    fn copy_mapped_attributes(&self, group: &mut Group, source: &DirectoryGroup) -> bool {
        let mut changed = false;
        for attr in &self.config().mapped_group_attributes {
            let values = source.entry.get_attrs(attr).cloned().unwrap_or_default();
            if values.is_empty() {
                changed |= group.attributes.remove(attr).is_some();
            } else if group.get_attribute(attr) != Some(&values) {
                group.set_attribute(attr.clone(), values);
                changed = true;
            }
        }
        changed
    }

    async fn drop_missing_groups(
        &self,
        realm_id: Uuid,
        scope: &MapperScope,
        result: &mut SyncResult,
    ) -> FederationResult<()> {
        let mut removed: HashSet<Uuid> = HashSet::new();
        for node in scope.local.iter() {
            let id = node.id();
            if removed.contains(&id) {
                continue;
            }
            let Some(path) = scope.relative_path(id) else {
                continue;
            };
            if scope.directory.by_path(&path).is_some() {
                continue;
            }

            let subtree = scope.local.subtree_ids(id);
            self.store().delete(realm_id, id).await?;
            tracing::debug!(group = %path, removed = subtree.len(), "Dropped group missing from directory");
            for gone in subtree {
                removed.insert(gone);
                result.record_removed();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use kc_federation::{GroupMapperConfig, GroupMapperMode};
    use kc_model::{GroupTree, MembershipEdge, User};
    use kc_storage::{GroupProvider, InMemoryStore, MembershipProvider, StorageResult, UserProvider};
    use parking_lot::Mutex;

    use super::*;
    use crate::memory::InMemoryDirectory;

    const USERS_DN: &str = "ou=People,dc=keycloak,dc=org";
    const GROUPS_DN: &str = "ou=Groups,dc=keycloak,dc=org";

    fn setup(mode: GroupMapperMode) -> (Uuid, Arc<InMemoryDirectory>, Arc<InMemoryStore>, GroupLdapMapper) {
        let directory = Arc::new(InMemoryDirectory::new(USERS_DN));
        let john = directory.add_user("johnkeycloak", "John", "Doe");
        let ghost = "uid=ghost,ou=People,dc=keycloak,dc=org".to_string();
        let group11 = directory.add_group(GROUPS_DN, "group11", &[john.clone()]);
        directory.add_group(GROUPS_DN, "group1", &[group11, ghost]);
        directory.add_group(GROUPS_DN, "Team 2016/2017", &[john]);

        let store = Arc::new(InMemoryStore::new());
        let config = GroupMapperConfig::builder(GROUPS_DN)
            .mode(mode)
            .mapped_group_attributes(vec!["description".to_string()])
            .build()
            .unwrap();
        let mapper = GroupLdapMapper::new("ldap", config, directory.clone(), store.clone());
        (Uuid::now_v7(), directory, store, mapper)
    }

    #[tokio::test]
    async fn creates_tree_and_skips_dangling_members() {
        let (realm, _, store, mapper) = setup(GroupMapperMode::Import);

        let result = mapper.sync_data_from_directory(realm).await.unwrap();
        assert_eq!(result.added, 3);
        assert_eq!(result.memberships_imported, 2);
        assert_eq!(result.dangling_skipped, 1);
        assert!(!result.has_errors());

        assert!(store.get_by_path(realm, "/group1/group11").await.unwrap().is_some());
        assert!(store.get_by_path(realm, "/Team 2016/2017").await.unwrap().is_some());
        assert_eq!(store.count_users(realm).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_pass_is_a_noop() {
        let (realm, _, store, mapper) = setup(GroupMapperMode::Import);

        mapper.sync_data_from_directory(realm).await.unwrap();
        let tree = store.get_tree(realm).await.unwrap();

        let again = mapper.sync_data_from_directory(realm).await.unwrap();
        assert!(again.is_noop());
        assert_eq!(store.get_tree(realm).await.unwrap().roots(), tree.roots());
    }

    #[tokio::test]
    async fn read_only_sync_persists_no_edges() {
        let (realm, _, store, mapper) = setup(GroupMapperMode::ReadOnly);

        let result = mapper.sync_data_from_directory(realm).await.unwrap();
        assert_eq!(result.memberships_imported, 0);

        let john = store
            .get_user_by_username(realm, "johnkeycloak")
            .await
            .unwrap()
            .unwrap();
        assert!(store.get_user_memberships(realm, john.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn copies_mapped_attributes() {
        let (realm, directory, store, mapper) = setup(GroupMapperMode::ReadOnly);
        mapper.sync_data_from_directory(realm).await.unwrap();

        let dn = "cn=group1,ou=Groups,dc=keycloak,dc=org";
        let entry = directory.get(dn).unwrap().with_attr("description", ["Top group"]);
        directory.insert(entry);

        let result = mapper.sync_data_from_directory(realm).await.unwrap();
        assert_eq!(result.updated, 1);
        let group1 = store.get_by_path(realm, "/group1").await.unwrap().unwrap();
        assert_eq!(group1.get_first_attribute("description"), Some("Top group"));
    }

    #[tokio::test]
    async fn drops_groups_removed_from_directory() {
        let (realm, directory, store, mapper) = setup(GroupMapperMode::ReadOnly);
        mapper.sync_data_from_directory(realm).await.unwrap();

        directory.remove("cn=Team 2016/2017,ou=Groups,dc=keycloak,dc=org");
        let dropping = mapper.with_config(GroupMapperConfig {
            drop_non_existing_groups: true,
            ..mapper.config().clone()
        });
        let result = dropping.sync_data_from_directory(realm).await.unwrap();

        assert_eq!(result.removed, 1);
        assert!(store.get_by_path(realm, "/Team 2016/2017").await.unwrap().is_none());
        assert!(store.get_by_path(realm, "/group1").await.unwrap().is_some());
    }

    /// Delegates to an in-memory store and records how `/team` looks to a
    /// reader after every write: its description and member count.
    struct ObservedStore {
        inner: InMemoryStore,
        realm: Uuid,
        views: Mutex<Vec<Option<(Option<String>, u64)>>>,
    }

    impl ObservedStore {
        async fn observe(&self) {
            let team = self.inner.get_by_path(self.realm, "/team").await.unwrap();
            let view = match team {
                Some(team) => Some((
                    team.get_first_attribute("description").map(str::to_string),
                    self.inner.count_members(self.realm, team.id).await.unwrap(),
                )),
                None => None,
            };
            self.views.lock().push(view);
        }
    }

    #[async_trait]
    impl GroupProvider for ObservedStore {
        async fn create(&self, group: &Group) -> StorageResult<()> {
            self.inner.create(group).await?;
            self.observe().await;
            Ok(())
        }

        async fn update(&self, group: &Group) -> StorageResult<()> {
            self.inner.update(group).await?;
            self.observe().await;
            Ok(())
        }

        async fn delete(&self, realm_id: Uuid, id: Uuid) -> StorageResult<()> {
            self.inner.delete(realm_id, id).await?;
            self.observe().await;
            Ok(())
        }

        async fn get_by_id(&self, realm_id: Uuid, id: Uuid) -> StorageResult<Option<Group>> {
            self.inner.get_by_id(realm_id, id).await
        }

        async fn get_by_path(&self, realm_id: Uuid, path: &str) -> StorageResult<Option<Group>> {
            self.inner.get_by_path(realm_id, path).await
        }

        async fn list_top_level(&self, realm_id: Uuid) -> StorageResult<Vec<Group>> {
            self.inner.list_top_level(realm_id).await
        }

        async fn list_children(&self, realm_id: Uuid, parent_id: Uuid) -> StorageResult<Vec<Group>> {
            self.inner.list_children(realm_id, parent_id).await
        }

        async fn get_tree(&self, realm_id: Uuid) -> StorageResult<GroupTree> {
            self.inner.get_tree(realm_id).await
        }

        async fn count(&self, realm_id: Uuid) -> StorageResult<u64> {
            self.inner.count(realm_id).await
        }

        async fn get_path(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<String> {
            self.inner.get_path(realm_id, group_id).await
        }
    }

    #[async_trait]
    impl UserProvider for ObservedStore {
        async fn create_user(&self, user: &User) -> StorageResult<()> {
            self.inner.create_user(user).await?;
            self.observe().await;
            Ok(())
        }

        async fn update_user(&self, user: &User) -> StorageResult<()> {
            self.inner.update_user(user).await?;
            self.observe().await;
            Ok(())
        }

        async fn delete_user(&self, realm_id: Uuid, id: Uuid) -> StorageResult<()> {
            self.inner.delete_user(realm_id, id).await?;
            self.observe().await;
            Ok(())
        }

        async fn get_user_by_id(&self, realm_id: Uuid, id: Uuid) -> StorageResult<Option<User>> {
            self.inner.get_user_by_id(realm_id, id).await
        }

        async fn get_user_by_username(
            &self,
            realm_id: Uuid,
            username: &str,
        ) -> StorageResult<Option<User>> {
            self.inner.get_user_by_username(realm_id, username).await
        }

        async fn count_users(&self, realm_id: Uuid) -> StorageResult<u64> {
            self.inner.count_users(realm_id).await
        }
    }

    #[async_trait]
    impl MembershipProvider for ObservedStore {
        async fn add_member(
            &self,
            realm_id: Uuid,
            user_id: Uuid,
            group_id: Uuid,
            origin: MembershipOrigin,
        ) -> StorageResult<bool> {
            let added = self.inner.add_member(realm_id, user_id, group_id, origin).await?;
            self.observe().await;
            Ok(added)
        }

        async fn save_group_with_members(
            &self,
            group: &Group,
            members: &[(Uuid, MembershipOrigin)],
        ) -> StorageResult<usize> {
            let added = self.inner.save_group_with_members(group, members).await?;
            self.observe().await;
            Ok(added)
        }

        async fn remove_member(
            &self,
            realm_id: Uuid,
            user_id: Uuid,
            group_id: Uuid,
        ) -> StorageResult<bool> {
            let removed = self.inner.remove_member(realm_id, user_id, group_id).await?;
            self.observe().await;
            Ok(removed)
        }

        async fn get_membership(
            &self,
            realm_id: Uuid,
            user_id: Uuid,
            group_id: Uuid,
        ) -> StorageResult<Option<MembershipEdge>> {
            self.inner.get_membership(realm_id, user_id, group_id).await
        }

        async fn get_user_memberships(
            &self,
            realm_id: Uuid,
            user_id: Uuid,
        ) -> StorageResult<Vec<MembershipEdge>> {
            self.inner.get_user_memberships(realm_id, user_id).await
        }

        async fn get_members(
            &self,
            realm_id: Uuid,
            group_id: Uuid,
            max_results: Option<usize>,
            offset: Option<usize>,
        ) -> StorageResult<Vec<MembershipEdge>> {
            self.inner
                .get_members(realm_id, group_id, max_results, offset)
                .await
        }

        async fn count_members(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<u64> {
            self.inner.count_members(realm_id, group_id).await
        }
    }

    #[tokio::test]
    async fn readers_never_see_a_partially_synced_group() {
        let directory = Arc::new(InMemoryDirectory::new(USERS_DN));
        let members: Vec<String> = ["john", "mary", "rob"]
            .iter()
            .map(|name| directory.add_user(name, name, "Keycloak"))
            .collect();
        let team_dn = directory.add_group(GROUPS_DN, "team", &members);
        let team = directory.get(&team_dn).unwrap().with_attr("description", ["Team"]);
        directory.insert(team);

        let realm = Uuid::now_v7();
        let store = Arc::new(ObservedStore {
            inner: InMemoryStore::new(),
            realm,
            views: Mutex::new(Vec::new()),
        });
        let config = GroupMapperConfig::builder(GROUPS_DN)
            .mode(GroupMapperMode::Import)
            .mapped_group_attributes(vec!["description".to_string()])
            .build()
            .unwrap();
        let mapper = GroupLdapMapper::new("ldap", config, directory, store.clone());

        let result = mapper.sync_data_from_directory(realm).await.unwrap();
        assert_eq!(result.memberships_imported, 3);

        let views = store.views.lock().clone();
        assert!(views.contains(&Some((Some("Team".to_string()), 3))));
        for view in views.iter().flatten() {
            assert_eq!(view, &(Some("Team".to_string()), 3));
        }
    }

    #[tokio::test]
    async fn unavailable_directory_aborts_the_pass() {
        let (realm, directory, _, mapper) = setup(GroupMapperMode::Import);
        directory.set_available(false);

        let err = mapper.sync_data_from_directory(realm).await.unwrap_err();
        assert!(err.is_directory_unavailable());
    }
}
