//! Stable fingerprinting for the Branch Cache.

/// FNV-1a, chosen for being a dependency-free hash that is stable across
/// processes and restarts.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Whitespace-normalized, lowercased form of player input, for the
/// fingerprint's input component.
pub fn normalize_input(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// `fingerprint(M, A, input)`: depends only on M's sorted keys (via
/// `Manifest::digest`), A's normalized form, and input's whitespace-
/// normalized lowercase form.
pub fn fingerprint(manifest_digest: &str, normalized_action_key: &str, input: &str) -> String {
    let combined = format!("{manifest_digest}||{normalized_action_key}||{}", normalize_input(input));
    format!("{:x}", fnv1a(combined.as_bytes()))
}
