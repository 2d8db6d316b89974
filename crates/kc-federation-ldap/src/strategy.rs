//! Membership retrieval strategies.
//!
//! Two ways to answer "which directory groups is this user in":
//!
//! - `LOAD_GROUPS_BY_MEMBER_ATTRIBUTE` searches the groups subtree for
//!   groups whose membership attribute references the user.
//! - `GET_GROUPS_FROM_USER_MEMBEROF_ATTRIBUTE` reads a multi-valued
//!   attribute on the user entry holding group DNs.
//!
//! On consistent data both return the same set.

use kc_federation::{FederationResult, MembershipRetrieveStrategy};

use crate::adapter::{DirectoryGroup, DirectoryGroupAdapter, DirectoryUser};
use crate::dn;

/// Lists the groups of `user` with the chosen strategy.
///
/// ## Errors
///
/// Returns `DirectoryUnavailable` if the directory cannot be reached.
pub async fn groups_for_user(
    adapter: &DirectoryGroupAdapter,
    user: &DirectoryUser,
    strategy: MembershipRetrieveStrategy,
) -> FederationResult<Vec<DirectoryGroup>> {
    let groups = match strategy {
        MembershipRetrieveStrategy::LoadGroupsByMemberAttribute => {
            by_member_attribute(adapter, user).await?
        }
        MembershipRetrieveStrategy::GetGroupsFromUserMemberOfAttribute => {
            from_member_of(adapter, user).await?
        }
    };

    tracing::trace!(
        user = %user.username,
        strategy = %strategy,
        count = groups.len(),
        "Retrieved directory groups for user"
    );
    Ok(groups)
}

async fn by_member_attribute(
    adapter: &DirectoryGroupAdapter,
    user: &DirectoryUser,
) -> FederationResult<Vec<DirectoryGroup>> {
    adapter
        .groups_with_member(&adapter.membership_value(user))
        .await
}

async fn from_member_of(
    adapter: &DirectoryGroupAdapter,
    user: &DirectoryUser,
) -> FederationResult<Vec<DirectoryGroup>> {
    let config = adapter.config();
    let Some(values) = user.entry.get_attrs(&config.member_of_attribute) else {
        return Ok(Vec::new());
    };

    let mut groups: Vec<DirectoryGroup> = Vec::new();
    for value in values {
        if !dn::is_within(value, &config.groups_dn) {
            continue;
        }
        if groups.iter().any(|g| dn::dn_eq(&g.dn, value)) {
            continue;
        }
        match adapter.lookup_group(value).await? {
            Some(group) => groups.push(group),
            None => {
                tracing::debug!(
                    user = %user.username,
                    group_dn = %value,
                    "Skipping memberOf value that is not a known group"
                );
            }
        }
    }
    Ok(groups)
}
