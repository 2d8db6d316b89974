//! Command implementations.

pub mod config;
pub mod directory;
pub mod sync;

use std::sync::Arc;

pub use config::run_config;
pub use directory::{run_groups, run_members};
pub use sync::run_sync;

use kc_federation_ldap::LdapServerDirectory;

use crate::output::prompt_password;
use crate::{CliConfig, CliResult};

/// Opens the configured directory.
///
/// The bind credential comes from the argument, the file, or a prompt,
/// in that order.
pub fn open_directory(
    config: &CliConfig,
    bind_credential: Option<&str>,
) -> CliResult<Arc<LdapServerDirectory>> {
    let mut ldap = config.ldap()?.clone();
    tracing::debug!(url = %ldap.connection_url, bind_dn = %ldap.bind_dn, "Opening directory");
    if let Some(credential) = bind_credential {
        ldap.bind_credential = credential.to_string();
    }
    if ldap.bind_credential.is_empty() {
        ldap.bind_credential = prompt_password("LDAP bind credential: ")?;
    }
    Ok(Arc::new(LdapServerDirectory::new(ldap)?))
}
