//! Both membership retrieval strategies.

use kc_federation::{GroupMapperConfig, GroupMapperMode, MembershipRetrieveStrategy};
use kc_federation_ldap::LdapEntry;

use crate::common::{names, TestEnv, GROUPS_DN};

fn with_values(env: &TestEnv, user_dn: &str, attr: &str, values: &[String]) {
    let entry: LdapEntry = env
        .directory
        .get(user_dn)
        .expect("user exists")
        .with_attr(attr, values.iter().cloned());
    env.directory.insert(entry);
}

#[tokio::test]
async fn member_of_strategy_reads_the_configured_user_attribute() -> anyhow::Result<()> {
    let env = TestEnv::new();
    with_values(
        &env,
        &env.john_dn,
        "street",
        &[
            TestEnv::group_dn("group1"),
            "cn=admins,ou=Roles,dc=keycloak,dc=org".to_string(),
            TestEnv::group_dn("removed"),
        ],
    );

    let mapper = env.mapper_with(
        GroupMapperConfig::builder(GROUPS_DN)
            .mode(GroupMapperMode::LdapOnly)
            .retrieve_strategy(MembershipRetrieveStrategy::GetGroupsFromUserMemberOfAttribute)
            .member_of_attribute("street"),
    );
    let john = mapper.import_user(env.realm, "johnkeycloak").await?;

    // Only `street` counts: group11 lists john as a member but is not named there.
    let groups = mapper.get_groups_for_user(env.realm, &john).await?;
    assert_eq!(names(&groups), vec!["group1"]);
    Ok(())
}

#[tokio::test]
async fn strategies_agree_when_member_of_is_maintained() -> anyhow::Result<()> {
    let env = TestEnv::new();
    with_values(&env, &env.john_dn, "memberOf", &[TestEnv::group_dn("group11")]);
    with_values(&env, &env.mary_dn, "memberOf", &[TestEnv::group_dn("group1")]);

    let by_member = env.mapper(GroupMapperMode::ReadOnly);
    let by_member_of = by_member.with_config(
        by_member
            .config()
            .with_retrieve_strategy(MembershipRetrieveStrategy::GetGroupsFromUserMemberOfAttribute),
    );

    for username in ["johnkeycloak", "marykeycloak", "robkeycloak"] {
        let user = by_member.import_user(env.realm, username).await?;
        let expected = names(&by_member.get_groups_for_user(env.realm, &user).await?);
        let actual = names(&by_member_of.get_groups_for_user(env.realm, &user).await?);
        assert_eq!(expected, actual, "groups of {username}");
    }
    Ok(())
}

#[tokio::test]
async fn member_of_strategy_in_import_mode_seeds_local_edges() -> anyhow::Result<()> {
    let env = TestEnv::new();
    with_values(
        &env,
        &env.rob_dn,
        "memberOf",
        &[TestEnv::group_dn("group2"), TestEnv::group_dn("group12")],
    );

    let mapper = env.mapper_with(
        GroupMapperConfig::builder(GROUPS_DN)
            .mode(GroupMapperMode::Import)
            .retrieve_strategy(MembershipRetrieveStrategy::GetGroupsFromUserMemberOfAttribute),
    );
    let rob = mapper.import_user(env.realm, "robkeycloak").await?;

    env.directory.set_available(false);
    let groups = mapper.get_groups_for_user(env.realm, &rob).await?;
    assert_eq!(names(&groups), vec!["group12", "group2"]);
    Ok(())
}
