//! Organization name canonicalization and partition naming.
//!
//! Raw organization names never reach storage: every lookup key and every
//! partition name goes through [`canonicalize`] first.

/// Prefix shared by every tenant partition
pub const PARTITION_PREFIX: &str = "org_";

/// Postgres truncates identifiers past this many bytes
pub const MAX_PARTITION_NAME_LEN: usize = 63;

/// Longest canonical name whose partition name still fits an identifier
pub const MAX_CANONICAL_LEN: usize = MAX_PARTITION_NAME_LEN - PARTITION_PREFIX.len();

/// Lower-case, trim, and collapse every run of characters outside `[a-z0-9]`
/// into a single `_`. Leading and trailing separators are dropped.
///
/// `canonicalize(canonicalize(x)) == canonicalize(x)` for every input.
pub fn canonicalize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_separator = false;

    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_separator = false;
        } else if !in_separator {
            out.push('_');
            in_separator = true;
        }
    }

    out.trim_matches('_').to_string()
}

/// Deterministic partition identifier for a canonical organization name
pub fn partition_name(canonical: &str) -> String {
    format!("{}{}", PARTITION_PREFIX, canonical)
}

/// Partition names must carry the prefix, only `[a-z0-9_]` characters, and
/// fit in a Postgres identifier without truncation
pub fn is_valid_partition_name(name: &str) -> bool {
    if name.len() > MAX_PARTITION_NAME_LEN {
        return false;
    }
    match name.strip_prefix(PARTITION_PREFIX) {
        Some(rest) if !rest.is_empty() => rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        _ => false,
    }
}
