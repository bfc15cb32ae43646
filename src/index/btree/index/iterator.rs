use std::sync::Arc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::types::{PageReadGuard, INVALID_PAGE_ID};
use crate::storage::buffer::BufferPoolManager;
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{LeafNode, OpType, TreeNode};
use crate::index::btree::serialization::deserialize_node;
use crate::transaction::concurrency::{PageLatch, Transaction};
use super::base::{BPlusTree, LatchMode};

/// Forward scan over the leaf chain. Exactly one leaf is read-latched and
/// pinned at any time; advancing past a leaf releases it before latching
/// its successor, so a full scan never holds two latches at once.
pub struct TreeIterator<K, V> {
    buffer_pool: Arc<BufferPoolManager>,
    current: Option<(PageReadGuard, LeafNode<K, V>)>,
    index: usize,
}

impl<K, V> TreeIterator<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(
        buffer_pool: Arc<BufferPoolManager>,
        current: Option<(PageReadGuard, LeafNode<K, V>)>,
        index: usize,
    ) -> Self {
        Self {
            buffer_pool,
            current,
            index,
        }
    }

    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Release the current leaf: drop the latch, then drop the pin
    fn release_current(&mut self) {
        if let Some((guard, _)) = self.current.take() {
            let page_id = guard.page_id;
            drop(guard);
            let _ = self.buffer_pool.unpin_page(page_id, false);
        }
    }

    /// Hop to the next leaf in the sibling chain
    fn advance_leaf(&mut self) -> Result<(), BTreeError> {
        let next_id = match &self.current {
            Some((_, leaf)) => leaf.next_page_id,
            None => return Ok(()),
        };
        self.release_current();
        if next_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let page = self.buffer_pool.fetch_page(next_id)?;
        let guard = page.read_arc();
        let node: TreeNode<K, V> = deserialize_node(&guard)?;
        match node {
            TreeNode::Leaf(leaf) => {
                self.index = 0;
                self.current = Some((guard, leaf));
                Ok(())
            }
            TreeNode::Internal(_) => {
                drop(guard);
                let _ = self.buffer_pool.unpin_page(next_id, false);
                Err(BTreeError::UnexpectedNodeKind(next_id))
            }
        }
    }
}

impl<K, V> Iterator for TreeIterator<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            let leaf = match &self.current {
                Some((_, leaf)) => leaf,
                None => return None,
            };
            if self.index < leaf.size() {
                let entry = leaf.entries[self.index].clone();
                self.index += 1;
                return Some(entry);
            }
            if self.advance_leaf().is_err() {
                return None;
            }
        }
    }
}

impl<K, V> Drop for TreeIterator<K, V> {
    fn drop(&mut self) {
        if let Some((guard, _)) = self.current.take() {
            let page_id = guard.page_id;
            drop(guard);
            let _ = self.buffer_pool.unpin_page(page_id, false);
        }
    }
}

impl<K, V> BPlusTree<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Iterate from the leftmost leaf
    pub fn begin(&self) -> Result<TreeIterator<K, V>, BTreeError> {
        self.make_iterator(None)
    }

    /// Iterate from the first entry whose key is >= `key`
    pub fn begin_at(&self, key: &K) -> Result<TreeIterator<K, V>, BTreeError> {
        self.make_iterator(Some(key))
    }

    fn make_iterator(&self, key: Option<&K>) -> Result<TreeIterator<K, V>, BTreeError> {
        let mut scratch = Transaction::new(0);
        let found = self.find_leaf_page(key, OpType::Read, &mut scratch)?;
        // a root-only descent keeps the root latch; drop it before handing
        // the leaf to the iterator
        self.unlock_root(LatchMode::Shared);

        let (leaf_id, node) = match found {
            Some(found) => found,
            None => return Ok(TreeIterator::new(self.buffer_pool.clone(), None, 0)),
        };
        let leaf = match node {
            TreeNode::Leaf(leaf) => leaf,
            TreeNode::Internal(_) => {
                return Err(BTreeError::UnexpectedNodeKind(leaf_id));
            }
        };
        let guard = match scratch.take_latched_pages().pop() {
            Some(PageLatch::Shared(guard)) => guard,
            _ => unreachable!("read descent leaves exactly the leaf latched"),
        };
        let index = match key {
            Some(key) => leaf.key_index(key),
            None => 0,
        };
        Ok(TreeIterator::new(
            self.buffer_pool.clone(),
            Some((guard, leaf)),
            index,
        ))
    }
}
