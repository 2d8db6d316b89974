//! Directory access over LDAPS.
//!
//! ## Security Requirements
//!
//! - All connections use LDAPS (TLS from connection start)
//! - Bind credentials are never logged

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{Mod, Scope, SearchEntry};

use crate::config::LdapConfig;
use crate::connection::LdapConnectionPool;
use crate::directory::{GroupQuery, LdapDirectory};
use crate::entry::LdapEntry;
use crate::error::{LdapError, LdapResult};

/// LDAP result code: success.
const RC_SUCCESS: u32 = 0;
/// LDAP result code: sizeLimitExceeded (partial results are usable).
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
/// LDAP result code: noSuchAttribute (value already absent).
const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
/// LDAP result code: attributeOrValueExists (value already present).
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
/// LDAP result code: noSuchObject.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// A directory backed by an LDAPS server.
pub struct LdapServerDirectory {
    pool: LdapConnectionPool,
}

impl LdapServerDirectory {
    /// Creates a directory over a validated configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration is invalid or not LDAPS.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        Ok(Self {
            pool: LdapConnectionPool::new(config),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        self.pool.config()
    }

    /// Tests the connection to the server.
    ///
    /// ## Errors
    ///
    /// Returns an error if the server cannot be reached or bound.
    pub async fn test_connection(&self) -> LdapResult<()> {
        self.pool.test_connection().await
    }

    async fn search(&self, base: &str, scope: Scope, filter: &str) -> LdapResult<Vec<LdapEntry>> {
        let read_timeout = self.config().read_timeout;
        let mut conn = self.pool.get().await?;

        let result = conn
            .ldap_mut()
            .with_timeout(read_timeout)
            .search(base, scope, filter, vec!["*"])
            .await;
        let ldap3::SearchResult(rs, res) = match result {
            Ok(found) => found,
            Err(e) => {
                drop(conn);
                self.pool.invalidate().await;
                return Err(e.into());
            }
        };

        match res.rc {
            RC_SUCCESS | RC_SIZE_LIMIT_EXCEEDED => {}
            RC_NO_SUCH_OBJECT => return Ok(Vec::new()),
            rc => {
                return Err(LdapError::Search(format!(
                    "{} (result code {rc})",
                    res.text
                )))
            }
        }

        tracing::trace!(base = %base, filter = %filter, found = rs.len(), "LDAP search");
        Ok(rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from_search_entry)
            .collect())
    }

    async fn modify(&self, dn: &str, modification: Mod<String>, already_done: u32) -> LdapResult<()> {
        let read_timeout = self.config().read_timeout;
        let mut conn = self.pool.get().await?;

        let result = conn
            .ldap_mut()
            .with_timeout(read_timeout)
            .modify(dn, vec![modification])
            .await;
        let res = match result {
            Ok(res) => res,
            Err(e) => {
                drop(conn);
                self.pool.invalidate().await;
                return Err(e.into());
            }
        };

        match res.rc {
            RC_SUCCESS => Ok(()),
            rc if rc == already_done => {
                tracing::debug!(dn = %dn, rc, "LDAP modify already in desired state");
                Ok(())
            }
            rc => Err(LdapError::Modify(format!("{} (result code {rc})", res.text))),
        }
    }
}

#[async_trait]
impl LdapDirectory for LdapServerDirectory {
    async fn search_groups(&self, query: &GroupQuery) -> LdapResult<Vec<LdapEntry>> {
        self.search(&query.base_dn, Scope::Subtree, &query.to_filter())
            .await
    }

    async fn find_user(&self, username: &str) -> LdapResult<Option<LdapEntry>> {
        let config = self.config();
        let filter = config.user_by_username_filter(username);
        let entries = self.search(&config.users_dn, Scope::Subtree, &filter).await?;
        Ok(entries.into_iter().next())
    }

    async fn lookup(&self, dn: &str) -> LdapResult<Option<LdapEntry>> {
        let entries = self.search(dn, Scope::Base, "(objectClass=*)").await?;
        Ok(entries.into_iter().next())
    }

    async fn add_value(&self, dn: &str, attr: &str, value: &str) -> LdapResult<()> {
        let modification = Mod::Add(attr.to_string(), HashSet::from([value.to_string()]));
        self.modify(dn, modification, RC_ATTRIBUTE_OR_VALUE_EXISTS)
            .await
    }

    async fn remove_value(&self, dn: &str, attr: &str, value: &str) -> LdapResult<()> {
        let modification = Mod::Delete(attr.to_string(), HashSet::from([value.to_string()]));
        self.modify(dn, modification, RC_NO_SUCH_ATTRIBUTE).await
    }

    fn username_attribute(&self) -> &str {
        self.config().username_attribute()
    }

    fn uuid_attribute(&self) -> &str {
        self.config().uuid_attribute()
    }
}
