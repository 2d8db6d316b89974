//! Directory entries.

use std::collections::HashMap;

use ldap3::SearchEntry;

/// Represents an LDAP entry with parsed attributes.
///
/// Attribute names are matched case-insensitively, as LDAP does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,

    /// Binary attributes.
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl LdapEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Creates a new LDAP entry from search result.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
            binary_attributes: entry.bin_attrs,
        }
    }

    /// Adds values to an attribute.
    #[must_use]
    pub fn with_attr<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = self.attr_key(name).unwrap_or(name).to_string();
        self.attributes
            .entry(key)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Gets a single-valued attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attr_key(name).and_then(|k| self.attributes.get(k))
    }

    /// Gets a mutable multi-valued attribute.
    pub fn get_attrs_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        let key = self.attr_key(name)?.to_string();
        self.attributes.get_mut(&key)
    }

    /// Gets a binary attribute.
    #[must_use]
    pub fn get_binary_attr(&self, name: &str) -> Option<&Vec<u8>> {
        self.binary_attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
    }

    /// Checks if the entry has an attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr_key(name).is_some()
    }

    /// Checks if the entry carries all the given object classes.
    #[must_use]
    pub fn has_object_classes(&self, classes: &[String]) -> bool {
        let Some(own) = self.get_attrs("objectClass") else {
            return false;
        };
        classes
            .iter()
            .all(|wanted| own.iter().any(|c| c.eq_ignore_ascii_case(wanted)))
    }

    /// Gets the external ID (UUID attribute value).
    #[must_use]
    pub fn external_id(&self, uuid_attr: &str) -> Option<String> {
        if let Some(val) = self.get_attr(uuid_attr) {
            return Some(val.to_string());
        }

        // Active Directory objectGUID is binary.
        self.get_binary_attr(uuid_attr).map(|bytes| format_guid(bytes))
    }

    fn attr_key<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.attributes.contains_key(name) {
            return Some(name);
        }
        self.attributes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// Formats a binary GUID (Active Directory format) as a string.
fn format_guid(bytes: &[u8]) -> String {
    if bytes.len() != 16 {
        return hex::encode(bytes);
    }

    // Mixed endianness: the first three fields are little-endian.
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode([bytes[3], bytes[2], bytes[1], bytes[0]]),
        hex::encode([bytes[5], bytes[4]]),
        hex::encode([bytes[7], bytes[6]]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..16]),
    )
}
