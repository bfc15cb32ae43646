use byteorder::{ByteOrder, LittleEndian};
use serde::de::DeserializeOwned;

use crate::common::types::{Page, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::TreeNode;
use super::encoding::LEN_PREFIX_SIZE;

/// Deserialize the B+ tree node held in a page's bytes
pub fn deserialize_node<K, V>(page: &Page) -> Result<TreeNode<K, V>, BTreeError>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    let len = LittleEndian::read_u32(&page.data[..LEN_PREFIX_SIZE]) as usize;
    if len == 0 || LEN_PREFIX_SIZE + len > PAGE_SIZE {
        return Err(BTreeError::DeserializationError(format!(
            "page {} does not hold a tree node",
            page.page_id
        )));
    }

    bincode::deserialize(&page.data[LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + len])
        .map_err(|e| BTreeError::DeserializationError(e.to_string()))
}
