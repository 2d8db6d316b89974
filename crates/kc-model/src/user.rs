//! User domain model.
//!
//! Users are the identities whose group memberships the federation
//! layer reads and writes. A user either lives only in the local store
//! or is linked to a directory entry through `federation_link`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User attribute holding the DN of the linked directory entry.
pub const LDAP_ENTRY_DN: &str = "LDAP_ENTRY_DN";

/// User attribute holding the stable directory id of the linked entry.
pub const LDAP_ID: &str = "LDAP_ID";

/// A local user, possibly linked to a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Realm this user belongs to.
    pub realm_id: Uuid,
    /// Unique username within the realm.
    pub username: String,
    /// Whether the user account is enabled.
    pub enabled: bool,

    /// Given name, copied from the directory on import.
    pub first_name: Option<String>,
    /// Surname, copied from the directory on import.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,

    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,

    /// Id of the federation provider that imported the user.
    pub federation_link: Option<String>,

    /// Multi-valued attributes.
    pub attributes: HashMap<String, Vec<String>>,
}

impl User {
    /// Creates a local, unlinked user.
    #[must_use]
    pub fn new(realm_id: Uuid, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            realm_id,
            username: username.into(),
            enabled: true,
            first_name: None,
            last_name: None,
            email: None,
            created_at: now,
            updated_at: now,
            federation_link: None,
            attributes: HashMap::new(),
        }
    }

    /// Links the user to the directory entry `entry_dn` of a federation provider.
    #[must_use]
    pub fn linked(mut self, provider_id: impl Into<String>, entry_dn: impl Into<String>) -> Self {
        self.federation_link = Some(provider_id.into());
        self.set_attribute(LDAP_ENTRY_DN, vec![entry_dn.into()]);
        self
    }

    /// Returns true if `provider_id` imported this user.
    #[must_use]
    pub fn is_linked_to(&self, provider_id: &str) -> bool {
        self.federation_link.as_deref() == Some(provider_id)
    }

    /// Returns the DN of the linked directory entry.
    #[must_use]
    pub fn directory_dn(&self) -> Option<&str> {
        self.get_first_attribute(LDAP_ENTRY_DN)
    }

    /// Gets an attribute value.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name)
    }

    /// Gets the first value of an attribute.
    #[must_use]
    pub fn get_first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Sets an attribute, replacing previous values.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }
}
