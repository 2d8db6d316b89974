//! Directory inspection commands.

use std::sync::Arc;

use kc_federation::MembershipRetrieveStrategy;
use kc_federation_ldap::{
    DirectoryGroup, DirectoryGroupAdapter, DirectoryGroupTree, MemberResolution,
};
use serde::Serialize;
use tabled::Tabled;

use crate::config::OutputFormat;
use crate::output::{info, output};
use crate::{CliConfig, CliResult};

use super::open_directory;

/// A directory group for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct DirectoryGroupRow {
    /// Path the group maps to below the groups path.
    pub path: String,
    /// Group DN.
    pub dn: String,
    /// Number of member references.
    pub members: usize,
}

/// A raw member reference for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MemberRow {
    /// Reference as stored on the group.
    pub reference: String,
    /// What it resolves to: `user`, `group` or `dangling`.
    pub kind: &'static str,
    /// Username or group name.
    pub name: String,
}

/// Lists the directory groups of a user.
pub async fn run_groups(
    username: &str,
    strategy: Option<MembershipRetrieveStrategy>,
    config: &CliConfig,
    bind_credential: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut mapper_config = config.mapper.group_mapper_config()?;
    if let Some(strategy) = strategy {
        mapper_config = mapper_config.with_retrieve_strategy(strategy);
    }
    let directory = open_directory(config, bind_credential)?;
    let adapter = DirectoryGroupAdapter::new(directory, Arc::new(mapper_config));
    let rows = groups_of(&adapter, username).await?;
    output(&rows, format)
}

/// Lists the raw member references of a directory group.
pub async fn run_members(
    group: &str,
    config: &CliConfig,
    bind_credential: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let mapper_config = config.mapper.group_mapper_config()?;
    let directory = open_directory(config, bind_credential)?;
    let adapter = DirectoryGroupAdapter::new(directory, Arc::new(mapper_config));
    let rows = members_of(&adapter, group).await?;

    let dangling = rows.iter().filter(|r| r.kind == "dangling").count();
    output(&rows, format)?;
    if dangling > 0 && matches!(format, OutputFormat::Table) {
        info(&format!("{dangling} member references point at no entry"));
    }
    Ok(())
}

async fn groups_of(
    adapter: &DirectoryGroupAdapter,
    username: &str,
) -> CliResult<Vec<DirectoryGroupRow>> {
    let user = adapter.load_user_by_username(username).await?;
    let strategy = adapter.config().retrieve_strategy;
    let groups = adapter.list_groups_for_user(&user, strategy).await?;

    let tree = DirectoryGroupTree::build(
        adapter.all_groups().await?,
        adapter.config().preserve_group_inheritance,
    )?;
    let mut rows: Vec<DirectoryGroupRow> = groups
        .iter()
        .map(|g| DirectoryGroupRow {
            path: tree
                .by_dn(&g.dn)
                .map_or_else(|| format!("/{}", g.name), |m| m.path.to_path_string()),
            dn: g.dn.clone(),
            members: g.members.len(),
        })
        .collect();
    rows.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(rows)
}

async fn members_of(adapter: &DirectoryGroupAdapter, name: &str) -> CliResult<Vec<MemberRow>> {
    let group: DirectoryGroup = adapter.load_group_by_name(name).await?;
    let mut rows = Vec::new();
    for reference in adapter.list_members(&group) {
        let (kind, name) = match adapter.resolve_member(&reference).await? {
            MemberResolution::User(user) => ("user", user.username),
            MemberResolution::Group(group) => ("group", group.name),
            MemberResolution::Dangling => ("dangling", String::new()),
        };
        rows.push(MemberRow {
            reference,
            kind,
            name,
        });
    }
    Ok(rows)
}
