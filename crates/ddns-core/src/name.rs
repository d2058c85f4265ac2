//! Domain name helpers
//!
//! Every name that reaches the wire is fully qualified: it ends with exactly
//! one trailing dot. Normalization is idempotent.

/// Normalize a name to FQDN form with exactly one trailing dot
///
/// ```
/// use ddns_core::name::fqdn;
///
/// assert_eq!(fqdn("example.com"), "example.com.");
/// assert_eq!(fqdn("example.com."), "example.com.");
/// assert_eq!(fqdn(&fqdn("example.com")), "example.com.");
/// ```
pub fn fqdn(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    format!("{}.", trimmed)
}

/// Build the owner name for `hostname` inside `zone`
///
/// An empty hostname or `@` addresses the zone apex.
pub fn owner_name(hostname: &str, zone: &str) -> String {
    let hostname = hostname.trim().trim_end_matches('.');
    if hostname.is_empty() || hostname == "@" {
        return fqdn(zone);
    }
    fqdn(&format!("{}.{}", hostname, zone.trim()))
}

/// Case-insensitive comparison key for a name
pub fn canonical(name: &str) -> String {
    fqdn(name).to_ascii_lowercase()
}

/// Whether `name` equals `zone` or lives below it
pub fn is_within(name: &str, zone: &str) -> bool {
    let name = canonical(name);
    let zone = canonical(zone);
    zone == "." || name == zone || name.ends_with(&format!(".{}", zone))
}
