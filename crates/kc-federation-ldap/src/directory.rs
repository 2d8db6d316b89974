//! Directory capability trait.
//!
//! The group federation layer needs only a handful of directory operations:
//! search for groups, look up a user or a DN, and add or remove a single
//! attribute value. [`LdapDirectory`] captures exactly that, so the same
//! mapper runs against a live server ([`LdapServerDirectory`]) or an
//! in-memory tree ([`InMemoryDirectory`]).
//!
//! [`LdapServerDirectory`]: crate::server::LdapServerDirectory
//! [`InMemoryDirectory`]: crate::memory::InMemoryDirectory

use async_trait::async_trait;

use crate::config::{ldap_escape, object_class_filter};
use crate::entry::LdapEntry;
use crate::error::LdapResult;

/// A subtree search for group entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    /// Search base.
    pub base_dn: String,
    /// Required object classes.
    pub object_classes: Vec<String>,
    /// Optional `attribute = value` equality constraint.
    pub equals: Option<(String, String)>,
}

impl GroupQuery {
    /// Creates a query for all groups below `base_dn`.
    #[must_use]
    pub fn new(base_dn: impl Into<String>, object_classes: Vec<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            object_classes,
            equals: None,
        }
    }

    /// Restricts the query to entries where `attr` has `value`.
    #[must_use]
    pub fn with_equals(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals = Some((attr.into(), value.into()));
        self
    }

    /// Renders the query as an LDAP filter.
    #[must_use]
    pub fn to_filter(&self) -> String {
        let classes = object_class_filter(&self.object_classes);
        match &self.equals {
            Some((attr, value)) => format!("(&{classes}({attr}={}))", ldap_escape(value)),
            None => classes,
        }
    }
}

/// Directory operations used by group federation.
///
/// Modifications are idempotent: adding a value that is present, or
/// removing one that is absent, succeeds without change.
#[async_trait]
pub trait LdapDirectory: Send + Sync {
    /// Searches the subtree below the query base for matching groups.
    async fn search_groups(&self, query: &GroupQuery) -> LdapResult<Vec<LdapEntry>>;

    /// Finds a user entry by username.
    async fn find_user(&self, username: &str) -> LdapResult<Option<LdapEntry>>;

    /// Reads a single entry by DN.
    async fn lookup(&self, dn: &str) -> LdapResult<Option<LdapEntry>>;

    /// Adds one value to an attribute of an entry.
    async fn add_value(&self, dn: &str, attr: &str, value: &str) -> LdapResult<()>;

    /// Removes one value from an attribute of an entry.
    async fn remove_value(&self, dn: &str, attr: &str, value: &str) -> LdapResult<()>;

    /// Returns the attribute holding usernames on user entries.
    fn username_attribute(&self) -> &str;

    /// Returns the attribute holding the stable entry identifier.
    fn uuid_attribute(&self) -> &str {
        "entryUUID"
    }
}
