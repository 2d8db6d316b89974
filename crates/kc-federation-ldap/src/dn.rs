//! Distinguished name helpers.
//!
//! DNs are compared in a normalized form: attribute types and values
//! lowercased, whitespace around separators removed. Escaped separators
//! (`\,`) inside values are respected when splitting.

/// Splits a DN into its RDN components, honoring backslash escapes.
#[must_use]
pub fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(dn[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = dn[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// Returns the normalized form of a DN for comparisons.
#[must_use]
pub fn normalize(dn: &str) -> String {
    split_rdns(dn)
        .into_iter()
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => format!(
                "{}={}",
                attr.trim().to_lowercase(),
                value.trim().to_lowercase()
            ),
            None => rdn.to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Compares two DNs, ignoring case and separator whitespace.
#[must_use]
pub fn dn_eq(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Checks if `dn` lies at or below `base`.
#[must_use]
pub fn is_within(dn: &str, base: &str) -> bool {
    let dn = normalize(dn);
    let base = normalize(base);
    dn == base || dn.ends_with(&format!(",{base}"))
}

/// Returns the unescaped value of the first RDN if its type is `attr`.
#[must_use]
pub fn rdn_value(dn: &str, attr: &str) -> Option<String> {
    let first = split_rdns(dn).into_iter().next()?;
    let (name, value) = first.split_once('=')?;
    name.trim()
        .eq_ignore_ascii_case(attr)
        .then(|| unescape_value(value.trim()))
}

/// Builds a DN from an RDN attribute, a raw value and a parent DN.
#[must_use]
pub fn child_dn(attr: &str, value: &str, parent: &str) -> String {
    format!("{attr}={},{parent}", escape_value(value))
}

/// Escapes a raw value for use inside an RDN (RFC 4514).
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let needs_escape = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_spaces() {
        assert_eq!(
            normalize("CN=Group1, OU=Groups ,dc=Keycloak,dc=org"),
            "cn=group1,ou=groups,dc=keycloak,dc=org"
        );
        assert!(dn_eq(
            "uid=JohnKeycloak,ou=People,dc=keycloak,dc=org",
            "uid=johnkeycloak, ou=people, dc=keycloak, dc=org"
        ));
    }

    #[test]
    fn escaped_commas_stay_in_value() {
        let dn = child_dn("cn", "Doe, John", "ou=People,dc=example,dc=com");
        assert_eq!(dn, "cn=Doe\\, John,ou=People,dc=example,dc=com");
        assert_eq!(split_rdns(&dn).len(), 4);
        assert_eq!(rdn_value(&dn, "cn").as_deref(), Some("Doe, John"));
    }

    #[test]
    fn slash_names_need_no_escaping() {
        let dn = child_dn("cn", "Team 2016/2017", "ou=Groups,dc=keycloak,dc=org");
        assert_eq!(dn, "cn=Team 2016/2017,ou=Groups,dc=keycloak,dc=org");
        assert_eq!(rdn_value(&dn, "CN").as_deref(), Some("Team 2016/2017"));
        assert_eq!(rdn_value(&dn, "uid"), None);
    }

    #[test]
    fn subtree_membership() {
        let base = "ou=Groups,dc=keycloak,dc=org";
        assert!(is_within("cn=group1,ou=Groups,dc=keycloak,dc=org", base));
        assert!(is_within(base, base));
        assert!(!is_within("cn=john,ou=People,dc=keycloak,dc=org", base));
        assert!(!is_within("cn=x,ou=OtherGroups,dc=keycloak,dc=org", base));
    }

    #[test]
    fn escapes_leading_and_trailing_specials() {
        assert_eq!(escape_value("#admins "), "\\#admins\\ ");
        assert_eq!(escape_value("a+b"), "a\\+b");
    }
}
