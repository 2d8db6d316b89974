//! In-memory directory.
//!
//! Holds a flat list of entries and answers [`LdapDirectory`] calls the way
//! a directory server would. Useful for tests and for dry runs; it can be
//! switched offline to exercise unavailability handling.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::directory::{GroupQuery, LdapDirectory};
use crate::dn;
use crate::entry::LdapEntry;
use crate::error::{LdapError, LdapResult};

/// An in-memory directory tree.
#[derive(Debug)]
pub struct InMemoryDirectory {
    users_dn: String,
    username_attribute: String,
    entries: RwLock<Vec<LdapEntry>>,
    available: AtomicBool,
}

impl InMemoryDirectory {
    /// Creates an empty directory whose users live below `users_dn`.
    #[must_use]
    pub fn new(users_dn: impl Into<String>) -> Self {
        Self {
            users_dn: users_dn.into(),
            username_attribute: "uid".to_string(),
            entries: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Sets the username attribute (default `uid`).
    #[must_use]
    pub fn with_username_attribute(mut self, attr: impl Into<String>) -> Self {
        self.username_attribute = attr.into();
        self
    }

    /// Inserts an entry, replacing any entry with the same DN.
    pub fn insert(&self, entry: LdapEntry) {
        let mut entries = self.entries.write();
        entries.retain(|e| !dn::dn_eq(&e.dn, &entry.dn));
        entries.push(entry);
    }

    /// Adds an `inetOrgPerson` user below the users DN and returns its DN.
    pub fn add_user(&self, username: &str, first_name: &str, last_name: &str) -> String {
        let user_dn = dn::child_dn(&self.username_attribute, username, &self.users_dn);
        self.insert(
            LdapEntry::new(user_dn.clone())
                .with_attr("objectClass", ["top", "person", "organizationalPerson", "inetOrgPerson"])
                .with_attr(&self.username_attribute, [username])
                .with_attr("cn", [format!("{first_name} {last_name}")])
                .with_attr("givenName", [first_name])
                .with_attr("sn", [last_name])
                .with_attr("mail", [format!("{username}@email.org")])
                .with_attr("entryUUID", [uuid::Uuid::now_v7().to_string()]),
        );
        user_dn
    }

    /// Adds a `groupOfNames` group below `parent_dn` and returns its DN.
    pub fn add_group(&self, parent_dn: &str, name: &str, members: &[String]) -> String {
        let group_dn = dn::child_dn("cn", name, parent_dn);
        let mut entry = LdapEntry::new(group_dn.clone())
            .with_attr("objectClass", ["top", "groupOfNames"])
            .with_attr("cn", [name]);
        if !members.is_empty() {
            entry = entry.with_attr("member", members.iter().cloned());
        }
        self.insert(entry);
        group_dn
    }

    /// Removes the entry with the given DN.
    pub fn remove(&self, entry_dn: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !dn::dn_eq(&e.dn, entry_dn));
        entries.len() != before
    }

    /// Returns a copy of the entry with the given DN.
    #[must_use]
    pub fn get(&self, entry_dn: &str) -> Option<LdapEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| dn::dn_eq(&e.dn, entry_dn))
            .cloned()
    }

    /// Takes the directory online or offline.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn ensure_available(&self) -> LdapResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LdapError::connection("directory is offline"))
        }
    }

    fn modify<F>(&self, entry_dn: &str, f: F) -> LdapResult<()>
    where
        F: FnOnce(&mut LdapEntry),
    {
        self.ensure_available()?;
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| dn::dn_eq(&e.dn, entry_dn))
            .ok_or_else(|| LdapError::Modify(format!("No such object: {entry_dn}")))?;
        f(entry);
        Ok(())
    }
}

fn value_eq(a: &str, b: &str) -> bool {
    dn::normalize(a) == dn::normalize(b)
}

#[async_trait]
impl LdapDirectory for InMemoryDirectory {
    async fn search_groups(&self, query: &GroupQuery) -> LdapResult<Vec<LdapEntry>> {
        self.ensure_available()?;
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| dn::is_within(&e.dn, &query.base_dn))
            .filter(|e| e.has_object_classes(&query.object_classes))
            .filter(|e| match &query.equals {
                Some((attr, value)) => e
                    .get_attrs(attr)
                    .is_some_and(|values| values.iter().any(|v| value_eq(v, value))),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn find_user(&self, username: &str) -> LdapResult<Option<LdapEntry>> {
        self.ensure_available()?;
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| dn::is_within(&e.dn, &self.users_dn))
            .find(|e| {
                e.get_attr(&self.username_attribute)
                    .is_some_and(|u| u.eq_ignore_ascii_case(username))
            })
            .cloned())
    }

    async fn lookup(&self, entry_dn: &str) -> LdapResult<Option<LdapEntry>> {
        self.ensure_available()?;
        Ok(self.get(entry_dn))
    }

    async fn add_value(&self, entry_dn: &str, attr: &str, value: &str) -> LdapResult<()> {
        self.modify(entry_dn, |entry| {
            let present = entry
                .get_attrs(attr)
                .is_some_and(|values| values.iter().any(|v| value_eq(v, value)));
            if !present {
                let updated = std::mem::take(entry).with_attr(attr, [value]);
                *entry = updated;
            }
        })
    }

    async fn remove_value(&self, entry_dn: &str, attr: &str, value: &str) -> LdapResult<()> {
        self.modify(entry_dn, |entry| {
            let emptied = match entry.get_attrs_mut(attr) {
                Some(values) => {
                    values.retain(|v| !value_eq(v, value));
                    values.is_empty()
                }
                None => false,
            };
            if emptied {
                entry
                    .attributes
                    .retain(|k, _| !k.eq_ignore_ascii_case(attr));
            }
        })
    }

    fn username_attribute(&self) -> &str {
        &self.username_attribute
    }
}
