use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::common::types::{Page, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::TreeNode;

// Payload length prefix, then the bincode-encoded node
pub(crate) const LEN_PREFIX_SIZE: usize = 4;

/// Serialize a B+ tree node into a page's bytes
pub fn serialize_node<K, V>(node: &TreeNode<K, V>, page: &mut Page) -> Result<(), BTreeError>
where
    K: Serialize,
    V: Serialize,
{
    let payload = bincode::serialize(node)
        .map_err(|e| BTreeError::SerializationError(e.to_string()))?;
    if LEN_PREFIX_SIZE + payload.len() > PAGE_SIZE {
        return Err(BTreeError::NodeTooLarge);
    }

    page.data.fill(0);
    LittleEndian::write_u32(&mut page.data[..LEN_PREFIX_SIZE], payload.len() as u32);
    page.data[LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + payload.len()].copy_from_slice(&payload);
    Ok(())
}
