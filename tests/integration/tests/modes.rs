//! Mode semantics: where reads come from and where joins and leaves land.

use kc_federation::{GroupMapperMode, GroupSynchronization};
use kc_federation_ldap::LdapDirectory;
use kc_model::{Group, MembershipOrigin, User};
use kc_storage::{GroupProvider, MembershipProvider, UserProvider};

use crate::common::{names, usernames, TestEnv, PROVIDER};

async fn local_user(env: &TestEnv, username: &str) -> anyhow::Result<User> {
    let user = User::new(env.realm, username);
    env.store.create_user(&user).await?;
    Ok(user)
}

async fn local_group(env: &TestEnv, parent: Option<&Group>, name: &str) -> anyhow::Result<Group> {
    let group = match parent {
        Some(parent) => Group::new_child(env.realm, parent.id, name),
        None => Group::new(env.realm, name),
    };
    env.store.create(&group).await?;
    Ok(group)
}

// ============================================================================
// LDAP_ONLY
// ============================================================================

#[tokio::test]
async fn ldap_only_joins_and_leaves_write_the_directory() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::LdapOnly);
    mapper.sync_data_from_directory(env.realm).await?;

    let john = mapper.import_user(env.realm, "johnkeycloak").await?;
    assert!(john.is_linked_to(PROVIDER));

    let group1 = mapper.group_by_path(env.realm, "/group1").await?;
    let group12 = mapper.group_by_path(env.realm, "/group1/group12").await?;
    mapper.join_group(env.realm, john.id, group1.id).await?;
    mapper.join_group(env.realm, john.id, group12.id).await?;

    assert!(env.member_values("group1").contains(&env.john_dn));
    assert_eq!(env.member_values("group12"), vec![env.john_dn.clone()]);
    assert!(env
        .store
        .get_user_memberships(env.realm, john.id)
        .await?
        .is_empty());

    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(names(&groups), vec!["group1", "group11", "group12"]);

    mapper.leave_group(env.realm, john.id, group12.id).await?;
    mapper.leave_group(env.realm, john.id, group1.id).await?;
    assert!(!env.member_values("group1").contains(&env.john_dn));

    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(names(&groups), vec!["group11"]);

    // Leaving again is a no-op.
    mapper.leave_group(env.realm, john.id, group1.id).await?;
    Ok(())
}

#[tokio::test]
async fn ldap_only_keeps_local_groups_local() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::LdapOnly);
    mapper.sync_data_from_directory(env.realm).await?;
    let john = mapper.import_user(env.realm, "johnkeycloak").await?;

    // group3/group31 and group4 exist only locally, group14 is a local
    // child of a directory group.
    let group3 = local_group(&env, None, "group3").await?;
    let group31 = local_group(&env, Some(&group3), "group31").await?;
    let group4 = local_group(&env, None, "group4").await?;
    let group1 = mapper.group_by_path(env.realm, "/group1").await?;
    let group14 = local_group(&env, Some(&group1), "group14").await?;

    for group in [&group31, &group4, &group14] {
        mapper.join_group(env.realm, john.id, group.id).await?;
    }
    assert_eq!(
        env.store.get_user_memberships(env.realm, john.id).await?.len(),
        3
    );
    assert!(!env.member_values("group1").contains(&env.john_dn));

    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(
        names(&groups),
        vec!["group11", "group14", "group31", "group4"]
    );

    mapper.leave_group(env.realm, john.id, group14.id).await?;
    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(names(&groups), vec!["group11", "group31", "group4"]);
    Ok(())
}

#[tokio::test]
async fn ldap_only_reads_fail_when_directory_is_down() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::LdapOnly);
    mapper.sync_data_from_directory(env.realm).await?;
    let john = mapper.import_user(env.realm, "johnkeycloak").await?;

    env.directory.set_available(false);
    let err = mapper
        .get_groups_for_user(env.realm, &john)
        .await
        .unwrap_err();
    assert!(err.is_directory_unavailable());
    Ok(())
}

#[tokio::test]
async fn users_without_federation_link_get_no_directory_groups() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::LdapOnly);

    // Same username as a directory user, but created locally.
    let shadow = local_user(&env, "johnkeycloak").await?;
    let groups = mapper.get_groups_for_user(env.realm, &shadow).await?;
    assert!(groups.is_empty());
    Ok(())
}

// ============================================================================
// READ_ONLY
// ============================================================================

#[tokio::test]
async fn read_only_unions_directory_and_local_memberships() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::ReadOnly);
    mapper.sync_data_from_directory(env.realm).await?;
    let mary = mapper.import_user(env.realm, "marykeycloak").await?;

    let directory_groups = names(&mapper.get_groups_for_user(env.realm, &mary).await?);
    assert_eq!(directory_groups, vec!["group1"]);

    let group2 = mapper.group_by_path(env.realm, "/group2").await?;
    mapper.join_group(env.realm, mary.id, group2.id).await?;
    assert!(env.member_values("group2").is_empty());

    let groups = names(&mapper.get_groups_for_user(env.realm, &mary).await?);
    assert_eq!(groups, vec!["group1", "group2"]);
    assert!(directory_groups.iter().all(|g| groups.contains(g)));

    // The local edge can be removed, the directory one cannot.
    mapper.leave_group(env.realm, mary.id, group2.id).await?;
    let group1 = mapper.group_by_path(env.realm, "/group1").await?;
    let err = mapper
        .leave_group(env.realm, mary.id, group1.id)
        .await
        .unwrap_err();
    assert!(err.is_policy_violation());
    assert!(env.member_values("group1").contains(&env.mary_dn));

    let groups = names(&mapper.get_groups_for_user(env.realm, &mary).await?);
    assert_eq!(groups, vec!["group1"]);
    Ok(())
}

#[tokio::test]
async fn read_only_members_merge_both_sources() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::ReadOnly);
    mapper.sync_data_from_directory(env.realm).await?;

    let rob = mapper.import_user(env.realm, "robkeycloak").await?;
    let group11 = mapper.group_by_path(env.realm, "/group1/group11").await?;
    mapper.join_group(env.realm, rob.id, group11.id).await?;

    let members = mapper.get_members(env.realm, group11.id, 0, 10).await?;
    assert_eq!(usernames(&members), vec!["johnkeycloak", "robkeycloak"]);

    let page = mapper.get_members(env.realm, group11.id, 1, 10).await?;
    assert_eq!(usernames(&page), vec!["robkeycloak"]);
    let page = mapper.get_members(env.realm, group11.id, 0, 1).await?;
    assert_eq!(usernames(&page), vec!["johnkeycloak"]);
    assert!(mapper.get_members(env.realm, group11.id, 5, 10).await?.is_empty());
    Ok(())
}

// ============================================================================
// IMPORT
// ============================================================================

#[tokio::test]
async fn import_memberships_survive_directory_changes() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::Import);
    mapper.sync_data_from_directory(env.realm).await?;

    let john = env
        .store
        .get_user_by_username(env.realm, "johnkeycloak")
        .await?
        .expect("john imported by sync");
    let groups = names(&mapper.get_groups_for_user(env.realm, &john).await?);
    assert_eq!(groups, vec!["group11"]);

    // Reads no longer touch the directory.
    env.directory.remove(&TestEnv::group_dn("group11"));
    env.directory.set_available(false);
    let groups = names(&mapper.get_groups_for_user(env.realm, &john).await?);
    assert_eq!(groups, vec!["group11"]);

    let group11 = mapper.group_by_path(env.realm, "/group1/group11").await?;
    let group2 = mapper.group_by_path(env.realm, "/group2").await?;
    mapper.join_group(env.realm, john.id, group2.id).await?;
    mapper.leave_group(env.realm, john.id, group11.id).await?;

    let groups = names(&mapper.get_groups_for_user(env.realm, &john).await?);
    assert_eq!(groups, vec!["group2"]);

    env.directory.set_available(true);
    assert!(env.member_values("group2").is_empty());
    Ok(())
}

#[tokio::test]
async fn import_edges_outlive_directory_membership_removal() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::Import);
    mapper.sync_data_from_directory(env.realm).await?;

    let john = env
        .store
        .get_user_by_username(env.realm, "johnkeycloak")
        .await?
        .expect("john imported by sync");
    let group11 = mapper.group_by_path(env.realm, "/group1/group11").await?;

    env.directory
        .remove_value(&TestEnv::group_dn("group11"), "member", &env.john_dn)
        .await?;
    assert!(env.member_values("group11").is_empty());

    let again = mapper.sync_data_from_directory(env.realm).await?;
    assert_eq!(again.memberships_imported, 0);
    assert_eq!(again.removed, 0);

    let edge = env
        .store
        .get_membership(env.realm, john.id, group11.id)
        .await?
        .expect("imported edge kept");
    assert_eq!(edge.origin, MembershipOrigin::Directory);
    let groups = names(&mapper.get_groups_for_user(env.realm, &john).await?);
    assert_eq!(groups, vec!["group11"]);
    Ok(())
}

#[tokio::test]
async fn import_mode_copies_memberships_on_first_import() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::Import);

    let mary = mapper.import_user(env.realm, "marykeycloak").await?;
    let edges = env.store.get_user_memberships(env.realm, mary.id).await?;
    assert_eq!(edges.len(), 1);
    assert!(edges[0].is_directory());

    let group1 = mapper.group_by_path(env.realm, "/group1").await?;
    assert_eq!(edges[0].group_id, group1.id);
    Ok(())
}
