//! Namespaced key formatting and parsing
//!
//! Every key stored by a dictionary is prefixed with its namespace and a
//! single `:` separator. The codec performs no escaping: a `:` inside a user
//! key passes through verbatim, and parsing simply strips the fixed-length
//! prefix.

/// Format a user key with the namespace prefix.
pub fn format_key(namespace: &str, key: &str) -> String {
    format!("{}:{}", namespace, key)
}

/// Recover the user key from a formatted key.
///
/// Must only be called with keys produced by [`format_key`] under the same
/// namespace; foreign keys are a caller bug.
pub fn parse_key<'a>(namespace: &str, formatted: &'a str) -> &'a str {
    debug_assert!(
        formatted.len() > namespace.len() && formatted.as_bytes()[namespace.len()] == b':',
        "parse_key called with a foreign key"
    );
    &formatted[namespace.len() + 1..]
}

/// Build the MATCH pattern used to enumerate keys under a namespace.
///
/// Glob metacharacters in `search_term` are passed through uninterpreted;
/// there is no escaping and no query language at this layer.
pub fn scan_pattern(namespace: &str, search_term: &str) -> String {
    format!("{}:{}*", namespace, search_term)
}

/// Name of the secondary-index key reserved for the ordered companion
/// container. Not read or written by this crate.
pub fn insertion_order_key(namespace: &str) -> String {
    format!("vaultdict-insertion-order-{}", namespace)
}
