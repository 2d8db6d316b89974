//! Sync command.

use std::sync::Arc;

use kc_federation::{
    FederationMapper, GroupMapperMode, GroupSynchronization, MapperConfig, SyncResult,
};
use kc_federation_ldap::GroupLdapMapper;
use kc_storage::{GroupProvider, InMemoryStore, MembershipProvider};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::config::OutputFormat;
use crate::output::{info, output, output_single, success, warning};
use crate::{CliConfig, CliResult};

use super::open_directory;

/// A local group after the sync pass.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct GroupRow {
    /// Group path.
    pub path: String,
    /// Number of local member edges.
    pub members: u64,
}

/// Sync result together with the resulting tree.
#[derive(Debug, Serialize)]
struct SyncReport {
    mapper: MapperConfig,
    result: SyncResult,
    groups: Vec<GroupRow>,
}

/// Runs a sync pass into a fresh in-memory store and prints the outcome.
pub async fn run_sync(
    mode: Option<GroupMapperMode>,
    config: &CliConfig,
    bind_credential: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut mapper_config = config.mapper.group_mapper_config()?;
    if let Some(mode) = mode {
        mapper_config = mapper_config.with_mode(mode);
    }

    let directory = open_directory(config, bind_credential)?;
    directory.test_connection().await?;

    let store = Arc::new(InMemoryStore::new());
    let realm_id = Uuid::now_v7();
    let mapper = GroupLdapMapper::new(&config.mapper.name, mapper_config, directory, store.clone());
    let result = mapper.sync_data_from_directory(realm_id).await?;
    let groups = group_rows(&store, realm_id).await?;

    match format {
        OutputFormat::Table => {
            success(&format!(
                "Sync finished: {} added, {} updated, {} removed, {} memberships imported",
                result.added, result.updated, result.removed, result.memberships_imported
            ));
            if result.dangling_skipped > 0 {
                info(&format!(
                    "{} dangling member references skipped",
                    result.dangling_skipped
                ));
            }
            for failure in &result.errors {
                warning(&format!("{}: {}", failure.dn, failure.message));
            }
            output(&groups, format)
        }
        _ => {
            let report = SyncReport {
                mapper: mapper.describe(&config.mapper.name),
                result,
                groups,
            };
            output_single(&report, format)
        }
    }
}

async fn group_rows(store: &InMemoryStore, realm_id: Uuid) -> CliResult<Vec<GroupRow>> {
    let tree = store.get_tree(realm_id).await?;
    let mut rows = Vec::with_capacity(tree.len());
    for node in tree.iter() {
        rows.push(GroupRow {
            path: tree.format(node.id()).unwrap_or_default(),
            members: store.count_members(realm_id, node.id()).await?,
        });
    }
    Ok(rows)
}
