//! Stable hashes used as identities.

use sha2::{Digest, Sha256};

use crate::types::ProductId;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Identity of a bundle: SHA-256 of the ascending, de-duplicated product
/// ids joined with commas. Order and repeats in the input do not matter.
pub fn group_key(product_ids: &[ProductId]) -> String {
    let mut ids = product_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    sha256_hex(joined.as_bytes())
}
