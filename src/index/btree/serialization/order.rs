use std::mem;

use crate::common::types::{PageId, PAGE_SIZE};
use super::encoding::LEN_PREFIX_SIZE;

// Generous allowance for the node header fields
const NODE_META_SIZE: usize = 64;
// Per-entry encoding slack on top of the raw field widths
const ENTRY_OVERHEAD: usize = 8;

/// Default capacity of a leaf node for the given key and value widths.
/// An estimate in the same spirit as sizing the entry array off the page
/// size; oversized variable-width keys are caught at serialization time.
pub fn default_leaf_max_size<K, V>() -> usize {
    let entry = mem::size_of::<K>() + mem::size_of::<V>() + ENTRY_OVERHEAD;
    ((PAGE_SIZE - LEN_PREFIX_SIZE - NODE_META_SIZE) / entry)
        .saturating_sub(1)
        .max(2)
}

/// Default capacity (child count) of an internal node for the given key
/// width
pub fn default_internal_max_size<K>() -> usize {
    let entry = mem::size_of::<K>() + mem::size_of::<PageId>() + ENTRY_OVERHEAD;
    ((PAGE_SIZE - LEN_PREFIX_SIZE - NODE_META_SIZE) / entry)
        .saturating_sub(1)
        .max(3)
}
