//! Content fingerprinting and in-batch duplicate removal.

use std::collections::HashSet;
use std::fmt::Write as _;

use cryptonews_core::{NormalizedItem, SourceKind};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `"{source}::{text}"`.
#[must_use]
pub fn content_hash(source: SourceKind, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b"::");
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Stamp every item with its content hash and keep only the first item for
/// each hash, preserving order.
#[must_use]
pub fn dedupe(mut items: Vec<NormalizedItem>) -> Vec<NormalizedItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items.retain_mut(|item| {
        let hash = content_hash(item.source, &item.text);
        let first = seen.insert(hash.clone());
        item.content_hash = Some(hash);
        first
    });
    items
}
