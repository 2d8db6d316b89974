//! The group sync job.

use kc_federation::{GroupMapperConfig, GroupMapperMode, GroupSynchronization};
use kc_model::MembershipEdge;
use kc_storage::{GroupProvider, MembershipProvider, UserProvider};
use uuid::Uuid;

use crate::common::{usernames, TestEnv, GROUPS_DN};

/// Group ids with their paths in tree order, and every directory user's edges.
async fn snapshot(env: &TestEnv) -> anyhow::Result<(Vec<(Uuid, String)>, Vec<MembershipEdge>)> {
    let tree = env.store.get_tree(env.realm).await?;
    let groups = tree
        .iter()
        .filter_map(|node| tree.format(node.id()).map(|path| (node.id(), path)))
        .collect();

    let mut edges = Vec::new();
    for username in ["johnkeycloak", "marykeycloak", "robkeycloak"] {
        if let Some(user) = env.store.get_user_by_username(env.realm, username).await? {
            edges.extend(env.store.get_user_memberships(env.realm, user.id).await?);
        }
    }
    Ok((groups, edges))
}

#[tokio::test]
async fn dangling_member_references_are_skipped() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.directory.add_group(
        GROUPS_DN,
        "dangling",
        &[
            env.john_dn.clone(),
            "uid=deleted,ou=People,dc=keycloak,dc=org".to_string(),
            TestEnv::group_dn("deleted-group"),
        ],
    );

    let mapper = env.mapper(GroupMapperMode::Import);
    let result = mapper.sync_data_from_directory(env.realm).await?;
    assert_eq!(result.added, 5);
    assert_eq!(result.dangling_skipped, 2);
    assert!(!result.has_errors());

    let group = mapper.group_by_path(env.realm, "/dangling").await?;
    assert_eq!(env.store.count_members(env.realm, group.id).await?, 1);

    let members = mapper.get_members(env.realm, group.id, 0, 100).await?;
    assert_eq!(usernames(&members), vec!["johnkeycloak"]);
    Ok(())
}

#[tokio::test]
async fn sync_is_idempotent() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::Import);

    let first = mapper.sync_data_from_directory(env.realm).await?;
    assert_eq!(first.added, 4);
    assert_eq!(first.memberships_imported, 2);
    let (groups, edges) = snapshot(&env).await?;
    assert_eq!(groups.len(), 4);
    assert_eq!(edges.len(), 2);
    let users = env.store.count_users(env.realm).await?;

    let second = mapper.sync_data_from_directory(env.realm).await?;
    assert!(second.is_noop());
    assert_eq!(snapshot(&env).await?, (groups, edges));
    assert_eq!(env.store.count_users(env.realm).await?, users);

    // A new directory member shows up on the next pass only.
    let group2 = TestEnv::group_dn("group2");
    let entry = env
        .directory
        .get(&group2)
        .expect("group2 exists")
        .with_attr("member", [env.rob_dn.clone()]);
    env.directory.insert(entry);

    let third = mapper.sync_data_from_directory(env.realm).await?;
    assert_eq!(third.added, 0);
    assert_eq!(third.memberships_imported, 1);
    Ok(())
}

#[tokio::test]
async fn unavailable_directory_leaves_local_state_untouched() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.directory.set_available(false);

    let mapper = env.mapper(GroupMapperMode::Import);
    let err = mapper.sync_data_from_directory(env.realm).await.unwrap_err();
    assert!(err.is_directory_unavailable());
    assert_eq!(env.store.count(env.realm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn drop_removes_groups_missing_from_directory() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::ReadOnly);
    mapper.sync_data_from_directory(env.realm).await?;
    let mary = mapper.import_user(env.realm, "marykeycloak").await?;
    let group2 = mapper.group_by_path(env.realm, "/group2").await?;
    mapper.join_group(env.realm, mary.id, group2.id).await?;

    env.directory.remove(&TestEnv::group_dn("group2"));
    let dropping = env.mapper_with(
        GroupMapperConfig::builder(GROUPS_DN)
            .mode(GroupMapperMode::ReadOnly)
            .drop_non_existing_groups(true),
    );
    let result = dropping.sync_data_from_directory(env.realm).await?;
    assert_eq!(result.removed, 1);

    assert!(mapper.group_by_path(env.realm, "/group2").await.is_err());
    assert!(env
        .store
        .get_user_memberships(env.realm, mary.id)
        .await?
        .is_empty());
    Ok(())
}
