use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::types::{PageId, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{InternalNode, LeafNode, OpType, TreeNode};
use crate::index::btree::serialization::serialize_node;
use crate::transaction::concurrency::{PageLatch, Transaction};
use super::base::{BPlusTree, LatchMode};

impl<K, V> BPlusTree<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Insert a key/value pair; false when the key already exists (keys
    /// are unique and the first value wins)
    pub fn insert(
        &self,
        key: K,
        value: V,
        txn: Option<&mut Transaction>,
    ) -> Result<bool, BTreeError> {
        let mut scratch = Transaction::new(0);
        let txn = match txn {
            Some(txn) => txn,
            None => &mut scratch,
        };

        loop {
            self.lock_root(LatchMode::Exclusive);
            if self.is_empty() {
                let started = self.start_new_tree(key, value);
                self.unlock_root(LatchMode::Exclusive);
                return started.map(|_| true);
            }
            self.unlock_root(LatchMode::Exclusive);

            // Concurrent removals may empty the tree between the root-latch
            // windows; retry from the top when the descent finds nothing
            match self.insert_into_leaf(key.clone(), value.clone(), txn)? {
                Some(inserted) => return Ok(inserted),
                None => continue,
            }
        }
    }

    /// Bootstrap an empty tree with a single-entry leaf root. Caller holds
    /// the root latch exclusively.
    fn start_new_tree(&self, key: K, value: V) -> Result<(), BTreeError> {
        let (page, page_id) = self
            .buffer_pool
            .new_page()
            .map_err(Self::map_pool_error)?;

        let mut root: LeafNode<K, V> = LeafNode::new(page_id, INVALID_PAGE_ID, self.leaf_max_size);
        root.insert(key, value);
        let write_result = {
            let mut guard = page.write();
            serialize_node(&TreeNode::Leaf(root), &mut guard)
        };

        self.set_root_page_id(page_id);
        self.update_root_page_id(true)?;
        self.buffer_pool.unpin_page(page_id, true)?;
        log::debug!("index {} started new tree at page {}", self.index_name, page_id);
        write_result
    }

    /// Write-crab down to the leaf and insert, splitting on overflow.
    /// Ok(None) means the tree emptied before the descent started.
    fn insert_into_leaf(
        &self,
        key: K,
        value: V,
        txn: &mut Transaction,
    ) -> Result<Option<bool>, BTreeError> {
        let found = self.find_leaf_page(Some(&key), OpType::Insert, txn)?;
        let (leaf_id, mut node) = match found {
            Some(found) => found,
            None => return Ok(None),
        };

        {
            let leaf = node.as_leaf_mut().expect("descent ends at a leaf");
            if leaf.lookup(&key).is_some() {
                self.remove_pages_in_transaction(OpType::Insert, txn)?;
                return Ok(Some(false));
            }
            leaf.insert(key, value);
        }

        if node.size() > self.leaf_max_size {
            self.split_leaf(leaf_id, &mut node, txn)?;
        } else {
            self.write_node(txn, &node)?;
        }
        self.remove_pages_in_transaction(OpType::Insert, txn)?;
        Ok(Some(true))
    }

    /// Split an overflowing leaf: move the upper half into a fresh sibling
    /// and thread the separator into the parent
    fn split_leaf(
        &self,
        leaf_id: PageId,
        node: &mut TreeNode<K, V>,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let (sibling_page, sibling_id) = self
            .buffer_pool
            .new_page()
            .map_err(Self::map_pool_error)?;
        txn.add_latched_page(PageLatch::Exclusive(sibling_page.write_arc()));

        let leaf = node.as_leaf_mut().expect("splitting a leaf");
        let mut sibling: LeafNode<K, V> =
            LeafNode::new(sibling_id, leaf.header.parent_page_id, self.leaf_max_size);
        let separator = leaf.move_half_to(&mut sibling);
        log::debug!("leaf {} split into {}", leaf_id, sibling_id);

        self.write_node(txn, &TreeNode::Leaf(sibling))?;
        self.write_node(txn, node)?;
        self.insert_into_parent(leaf_id, separator, sibling_id, txn)
    }

    /// Register a freshly split-off `right_id` next to `left_id` in their
    /// parent, growing a new root or splitting the parent recursively when
    /// needed
    pub(crate) fn insert_into_parent(
        &self,
        left_id: PageId,
        key: K,
        right_id: PageId,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let left = self.read_node(txn, left_id)?;

        if left.is_root() {
            // the split reached the top: grow a new root above both halves
            let (root_page, root_id) = self
                .buffer_pool
                .new_page()
                .map_err(Self::map_pool_error)?;
            let mut new_root: InternalNode<K> =
                InternalNode::new(root_id, INVALID_PAGE_ID, self.internal_max_size);
            new_root.populate_new_root(left_id, key, right_id);
            let write_result = {
                let mut guard = root_page.write();
                serialize_node(&TreeNode::<K, V>::Internal(new_root), &mut guard)
            };

            self.set_parent(txn, left_id, root_id)?;
            self.set_parent(txn, right_id, root_id)?;
            self.set_root_page_id(root_id);
            self.update_root_page_id(false)?;
            // the new root is never latched by this operation: unpin inline
            self.buffer_pool.unpin_page(root_id, true)?;
            log::debug!("index {} grew new root {}", self.index_name, root_id);
            return write_result;
        }

        let parent_id = left.parent_page_id();
        let mut parent = self.read_node(txn, parent_id)?;
        self.set_parent(txn, right_id, parent_id)?;
        {
            let internal = parent
                .as_internal_mut()
                .ok_or(BTreeError::UnexpectedNodeKind(parent_id))?;
            internal.insert_node_after(left_id, key, right_id);
        }

        if parent.size() > self.internal_max_size {
            self.split_internal(parent_id, &mut parent, txn)?;
        } else {
            self.write_node(txn, &parent)?;
        }
        Ok(())
    }

    /// Split an overflowing internal node and push its middle key upward
    fn split_internal(
        &self,
        node_id: PageId,
        node: &mut TreeNode<K, V>,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let (sibling_page, sibling_id) = self
            .buffer_pool
            .new_page()
            .map_err(Self::map_pool_error)?;
        txn.add_latched_page(PageLatch::Exclusive(sibling_page.write_arc()));

        let internal = node.as_internal_mut().expect("splitting an internal node");
        let mut sibling: InternalNode<K> = InternalNode::new(
            sibling_id,
            internal.header.parent_page_id,
            self.internal_max_size,
        );
        let push_key = internal.move_half_to(&mut sibling);
        let moved_children = sibling.children.clone();
        log::debug!("internal {} split into {}", node_id, sibling_id);

        self.write_node(txn, &TreeNode::<K, V>::Internal(sibling))?;
        self.write_node(txn, node)?;
        for child in moved_children {
            self.set_parent(txn, child, sibling_id)?;
        }
        self.insert_into_parent(node_id, push_key, sibling_id, txn)
    }
}
