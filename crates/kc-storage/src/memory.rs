//! In-memory local store.
//!
//! All state sits behind a single lock, so every read observes either the
//! state before or after a given mutation, never a partial one. Changes
//! that must appear together go through one call, see
//! [`MembershipProvider::save_group_with_members`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use kc_model::{Group, GroupTree, MembershipEdge, MembershipOrigin, User};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{EntityKind, StorageError, StorageResult};
use crate::group::GroupProvider;
use crate::membership::MembershipProvider;
use crate::user::UserProvider;

#[derive(Debug, Default)]
struct State {
    groups: HashMap<Uuid, Group>,
    users: HashMap<Uuid, User>,
    /// Edges tagged with their realm, in insertion order.
    memberships: Vec<(Uuid, MembershipEdge)>,
}

impl State {
    fn group(&self, realm_id: Uuid, id: Uuid) -> Option<&Group> {
        self.groups.get(&id).filter(|g| g.realm_id == realm_id)
    }

    fn user(&self, realm_id: Uuid, id: Uuid) -> Option<&User> {
        self.users.get(&id).filter(|u| u.realm_id == realm_id)
    }

    fn realm_groups(&self, realm_id: Uuid) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(move |g| g.realm_id == realm_id)
    }

    fn sorted_children(&self, realm_id: Uuid, parent_id: Option<Uuid>) -> Vec<Group> {
        let mut children: Vec<Group> = self
            .realm_groups(realm_id)
            .filter(|g| g.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        children
    }

    fn has_edge(&self, realm_id: Uuid, user_id: Uuid, group_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|(r, e)| *r == realm_id && e.user_id == user_id && e.group_id == group_id)
    }

    fn check_parent(&self, group: &Group) -> StorageResult<()> {
        let Some(parent_id) = group.parent_id else {
            return Ok(());
        };
        if self.group(group.realm_id, parent_id).is_none() {
            return Err(StorageError::group_not_found(parent_id));
        }

        // Walk up from the new parent; meeting the group itself means a cycle.
        let mut current = Some(parent_id);
        while let Some(id) = current {
            if id == group.id {
                return Err(StorageError::InvalidHierarchy(format!(
                    "group '{}' cannot be moved below itself",
                    group.name
                )));
            }
            current = self.groups.get(&id).and_then(|g| g.parent_id);
        }
        Ok(())
    }

    fn descendants(&self, realm_id: Uuid, id: Uuid) -> HashSet<Uuid> {
        let mut out = HashSet::from([id]);
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            for child in self
                .realm_groups(realm_id)
                .filter(|g| g.parent_id == Some(parent))
            {
                if out.insert(child.id) {
                    frontier.push(child.id);
                }
            }
        }
        out
    }

    fn tree(&self, realm_id: Uuid) -> GroupTree {
        GroupTree::from_groups(self.realm_groups(realm_id).cloned())
    }
}

/// A local store keeping groups, users and memberships in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupProvider for InMemoryStore {
    async fn create(&self, group: &Group) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.groups.contains_key(&group.id) {
            return Err(StorageError::duplicate(EntityKind::Group, "id", group.id.to_string()));
        }
        state.check_parent(group)?;
        state.groups.insert(group.id, group.clone());
        tracing::debug!(group_id = %group.id, name = %group.name, "Group created");
        Ok(())
    }

    async fn update(&self, group: &Group) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.group(group.realm_id, group.id).is_none() {
            return Err(StorageError::group_not_found(group.id));
        }
        state.check_parent(group)?;

        let mut updated = group.clone();
        updated.updated_at = Utc::now();
        state.groups.insert(group.id, updated);
        Ok(())
    }

    async fn delete(&self, realm_id: Uuid, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.group(realm_id, id).is_none() {
            return Err(StorageError::group_not_found(id));
        }

        let removed = state.descendants(realm_id, id);
        state.groups.retain(|gid, _| !removed.contains(gid));
        state
            .memberships
            .retain(|(_, edge)| !removed.contains(&edge.group_id));
        tracing::debug!(group_id = %id, removed = removed.len(), "Group deleted");
        Ok(())
    }

    async fn get_by_id(&self, realm_id: Uuid, id: Uuid) -> StorageResult<Option<Group>> {
        Ok(self.state.read().group(realm_id, id).cloned())
    }

    async fn get_by_path(&self, realm_id: Uuid, path: &str) -> StorageResult<Option<Group>> {
        let tree = self.state.read().tree(realm_id);
        Ok(tree.resolve(path).map(|node| node.group.clone()))
    }

    async fn list_top_level(&self, realm_id: Uuid) -> StorageResult<Vec<Group>> {
        Ok(self.state.read().sorted_children(realm_id, None))
    }

    async fn list_children(&self, realm_id: Uuid, parent_id: Uuid) -> StorageResult<Vec<Group>> {
        Ok(self.state.read().sorted_children(realm_id, Some(parent_id)))
    }

    async fn get_tree(&self, realm_id: Uuid) -> StorageResult<GroupTree> {
        Ok(self.state.read().tree(realm_id))
    }

    async fn count(&self, realm_id: Uuid) -> StorageResult<u64> {
        Ok(self.state.read().realm_groups(realm_id).count() as u64)
    }

    async fn get_path(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<String> {
        self.state
            .read()
            .tree(realm_id)
            .format(group_id)
            .ok_or_else(|| StorageError::group_not_found(group_id))
    }
}

#[async_trait]
impl UserProvider for InMemoryStore {
    async fn create_user(&self, user: &User) -> StorageResult<()> {
        let mut state = self.state.write();
        let taken = state
            .users
            .values()
            .any(|u| u.realm_id == user.realm_id && u.username.eq_ignore_ascii_case(&user.username));
        if taken || state.users.contains_key(&user.id) {
            return Err(StorageError::duplicate(EntityKind::User, "username", user.username.clone()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.user(user.realm_id, user.id).is_none() {
            return Err(StorageError::user_not_found(user.id));
        }
        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        state.users.insert(user.id, updated);
        Ok(())
    }

    async fn delete_user(&self, realm_id: Uuid, id: Uuid) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.user(realm_id, id).is_none() {
            return Err(StorageError::user_not_found(id));
        }
        state.users.remove(&id);
        state.memberships.retain(|(_, edge)| edge.user_id != id);
        Ok(())
    }

    async fn get_user_by_id(&self, realm_id: Uuid, id: Uuid) -> StorageResult<Option<User>> {
        Ok(self.state.read().user(realm_id, id).cloned())
    }

    async fn get_user_by_username(
        &self,
        realm_id: Uuid,
        username: &str,
    ) -> StorageResult<Option<User>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.realm_id == realm_id && u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn count_users(&self, realm_id: Uuid) -> StorageResult<u64> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .filter(|u| u.realm_id == realm_id)
            .count() as u64)
    }
}

#[async_trait]
impl MembershipProvider for InMemoryStore {
    async fn add_member(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
        origin: MembershipOrigin,
    ) -> StorageResult<bool> {
        let mut state = self.state.write();
        if state.user(realm_id, user_id).is_none() {
            return Err(StorageError::user_not_found(user_id));
        }
        if state.group(realm_id, group_id).is_none() {
            return Err(StorageError::group_not_found(group_id));
        }

        if state.has_edge(realm_id, user_id, group_id) {
            return Ok(false);
        }

        state.memberships.push((
            realm_id,
            MembershipEdge {
                user_id,
                group_id,
                origin,
            },
        ));
        Ok(true)
    }

    async fn save_group_with_members(
        &self,
        group: &Group,
        members: &[(Uuid, MembershipOrigin)],
    ) -> StorageResult<usize> {
        let realm_id = group.realm_id;
        let mut state = self.state.write();

        if state
            .groups
            .get(&group.id)
            .is_some_and(|g| g.realm_id != realm_id)
        {
            return Err(StorageError::duplicate(EntityKind::Group, "id", group.id.to_string()));
        }
        state.check_parent(group)?;
        if let Some((missing, _)) = members
            .iter()
            .find(|(user_id, _)| state.user(realm_id, *user_id).is_none())
        {
            return Err(StorageError::user_not_found(*missing));
        }

        let created = !state.groups.contains_key(&group.id);
        if state.groups.get(&group.id) != Some(group) {
            state.groups.insert(group.id, group.clone());
        }

        let mut added = 0;
        for &(user_id, origin) in members {
            if state.has_edge(realm_id, user_id, group.id) {
                continue;
            }
            state.memberships.push((
                realm_id,
                MembershipEdge {
                    user_id,
                    group_id: group.id,
                    origin,
                },
            ));
            added += 1;
        }

        tracing::debug!(group_id = %group.id, name = %group.name, created, added, "Group saved with members");
        Ok(added)
    }

    async fn remove_member(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
    ) -> StorageResult<bool> {
        let mut state = self.state.write();
        let before = state.memberships.len();
        state
            .memberships
            .retain(|(r, e)| !(*r == realm_id && e.user_id == user_id && e.group_id == group_id));
        Ok(state.memberships.len() != before)
    }

    async fn get_membership(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
        group_id: Uuid,
    ) -> StorageResult<Option<MembershipEdge>> {
        Ok(self
            .state
            .read()
            .memberships
            .iter()
            .find(|(r, e)| *r == realm_id && e.user_id == user_id && e.group_id == group_id)
            .map(|(_, e)| *e))
    }

    async fn get_user_memberships(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> StorageResult<Vec<MembershipEdge>> {
        Ok(self
            .state
            .read()
            .memberships
            .iter()
            .filter(|(r, e)| *r == realm_id && e.user_id == user_id)
            .map(|(_, e)| *e)
            .collect())
    }

    async fn get_members(
        &self,
        realm_id: Uuid,
        group_id: Uuid,
        max_results: Option<usize>,
        offset: Option<usize>,
    ) -> StorageResult<Vec<MembershipEdge>> {
        Ok(self
            .state
            .read()
            .memberships
            .iter()
            .filter(|(r, e)| *r == realm_id && e.group_id == group_id)
            .map(|(_, e)| *e)
            .skip(offset.unwrap_or(0))
            .take(max_results.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_members(&self, realm_id: Uuid, group_id: Uuid) -> StorageResult<u64> {
        Ok(self
            .state
            .read()
            .memberships
            .iter()
            .filter(|(r, e)| *r == realm_id && e.group_id == group_id)
            .count() as u64)
    }
}
