// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Field comparison rules shared by every entity's `PartialEq`/`Hash`.
//!
//! - strings compare trimmed and case-insensitively;
//! - tag-like collections (sales channels) compare as multisets;
//! - ordered lists (addresses, order lines) compare positionally;
//! - `None` equals `None` and nothing else.
//!
//! Each `Hash` impl feeds exactly the fields its `PartialEq` looks at, through
//! the matching helper here, so equal entities always hash equal.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3;

use crate::error::{Result, SyncError};

fn folded(value: &str) -> impl Iterator<Item = char> + '_ {
    value.trim().chars().flat_map(char::to_lowercase)
}

/// Trimmed, case-insensitive string equality.
pub fn text_eq(a: &str, b: &str) -> bool {
    folded(a).eq(folded(b))
}

/// [`text_eq`] lifted over optional strings.
pub fn opt_text_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => text_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Hash a string the way [`text_eq`] compares it.
pub fn hash_text<H: Hasher>(value: &str, state: &mut H) {
    for c in folded(value) {
        state.write_u32(c as u32);
    }
    state.write_u8(0xff);
}

/// Hash an optional string the way [`opt_text_eq`] compares it.
pub fn hash_opt_text<H: Hasher>(value: Option<&str>, state: &mut H) {
    match value {
        Some(v) => {
            state.write_u8(1);
            hash_text(v, state);
        }
        None => state.write_u8(0),
    }
}

/// Positional equality of two optional lists.
pub fn ordered_eq<T: PartialEq>(a: Option<&[T]>, b: Option<&[T]>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

/// Multiset equality of two optional collections.
pub fn unordered_eq<T: Eq + Hash>(a: Option<&[T]>, b: Option<&[T]>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut counts: HashMap<&T, isize> = HashMap::with_capacity(a.len());
            for item in a {
                *counts.entry(item).or_default() += 1;
            }
            for item in b {
                match counts.get_mut(item) {
                    Some(n) if *n > 0 => *n -= 1,
                    _ => return false,
                }
            }
            true
        }
        (None, None) => true,
        _ => false,
    }
}

/// Hash an optional ordered list.
pub fn hash_ordered<T: Hash, H: Hasher>(items: Option<&[T]>, state: &mut H) {
    match items {
        Some(items) => {
            state.write_u8(1);
            state.write_usize(items.len());
            for item in items {
                item.hash(state);
            }
        }
        None => state.write_u8(0),
    }
}

/// Hash an optional collection independently of element order.
pub fn hash_unordered<T: Hash, H: Hasher>(items: Option<&[T]>, state: &mut H) {
    match items {
        Some(items) => {
            let mut hashes: Vec<u64> = items.iter().map(stable_hash).collect();
            hashes.sort_unstable();
            state.write_u8(1);
            state.write_usize(hashes.len());
            for h in hashes {
                state.write_u64(h);
            }
        }
        None => state.write_u8(0),
    }
}

/// Hash a value with seeded XXH3. The result does not depend on the process,
/// the run or the toolchain's std hasher.
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Xxh3::with_seed(0);
    value.hash(&mut hasher);
    hasher.finish()
}

/// Compare two possibly absent entities. Never fails.
pub fn entities_equal<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

/// Hash code of a specific instance. Passing `None` is a contract violation.
pub fn hash_code<T: Hash>(entity: Option<&T>) -> Result<u64> {
    entity
        .map(stable_hash)
        .ok_or_else(|| SyncError::InvalidArgument {
            argument: "entity",
            message: "cannot compute the hash code of an absent entity".to_string(),
        })
}
