//! Group paths: names containing the separator and the mapper's groups path.

use kc_federation::{FederationError, GroupMapperConfig, GroupMapperMode, GroupSynchronization};
use kc_model::Group;
use kc_storage::GroupProvider;

use crate::common::{names, TestEnv, GROUPS_DN};

#[tokio::test]
async fn names_with_separators_resolve_greedily() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let nested = env.directory.add_group(GROUPS_DN, "2017", &[]);
    env.directory.add_group(GROUPS_DN, "Team 2016", &[nested]);
    env.directory
        .add_group(GROUPS_DN, "Team 2016/2017", &[env.john_dn.clone()]);

    let mapper = env.mapper(GroupMapperMode::ReadOnly);
    mapper.sync_data_from_directory(env.realm).await?;

    let team = mapper.group_by_path(env.realm, "/Team 2016/2017").await?;
    assert_eq!(team.name, "Team 2016/2017");
    assert!(team.is_top_level());

    let tree = env.store.get_tree(env.realm).await?;
    let team_2016 = mapper.group_by_path(env.realm, "/Team 2016").await?;
    let year = tree
        .find(team_2016.id)
        .and_then(|n| n.child_by_name("2017"))
        .expect("nested group synced");
    assert_eq!(tree.path_of(year.id()).map(|p| p.depth()), Some(2));

    // The longer name is tried first, then the split.
    let child = Group::new_child(env.realm, year.id(), "2018");
    env.store.create(&child).await?;
    let resolved = mapper.group_by_path(env.realm, "/Team 2016/2017/2018").await?;
    assert_eq!(resolved.id, child.id);

    let john = mapper.import_user(env.realm, "johnkeycloak").await?;
    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(names(&groups), vec!["Team 2016/2017", "group11"]);
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let mapper = env.mapper(GroupMapperMode::ReadOnly);
    mapper.sync_data_from_directory(env.realm).await?;

    let err = mapper
        .group_by_path(env.realm, "/group1/group13")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn groups_are_placed_below_the_groups_path() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let builder = || {
        GroupMapperConfig::builder(GROUPS_DN)
            .mode(GroupMapperMode::ReadOnly)
            .groups_path("/ldap groups")
    };

    let mapper = env.mapper_with(builder());
    let err = mapper
        .sync_data_from_directory(env.realm)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::Configuration(_)));

    env.store.create(&Group::new(env.realm, "ldap groups")).await?;
    let mapper = env.mapper_with(builder());
    let result = mapper.sync_data_from_directory(env.realm).await?;
    assert_eq!(result.added, 4);

    let group11 = mapper
        .group_by_path(env.realm, "/ldap groups/group1/group11")
        .await?;
    assert_eq!(group11.name, "group11");
    assert!(mapper.group_by_path(env.realm, "/group1").await.is_err());

    let mary = mapper.import_user(env.realm, "marykeycloak").await?;
    let groups = mapper.get_groups_for_user(env.realm, &mary).await?;
    assert_eq!(groups.len(), 1);
    assert_eq!(
        env.store.get_path(env.realm, groups[0].id).await?,
        "/ldap groups/group1"
    );
    Ok(())
}
