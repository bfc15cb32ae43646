use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::types::INVALID_PAGE_ID;
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{OpType, TreeNode};
use crate::transaction::concurrency::Transaction;
use super::base::BPlusTree;

impl<K, V> BPlusTree<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Remove `key` and its value; false when the key is absent. Underflow
    /// is repaired by redistribution or by merging with a sibling, possibly
    /// collapsing the root.
    pub fn remove(&self, key: &K, txn: Option<&mut Transaction>) -> Result<bool, BTreeError> {
        let mut scratch = Transaction::new(0);
        let txn = match txn {
            Some(txn) => txn,
            None => &mut scratch,
        };

        let found = self.find_leaf_page(Some(key), OpType::Delete, txn)?;
        let (_, mut node) = match found {
            Some(found) => found,
            None => return Ok(false),
        };

        let removed = {
            let leaf = node.as_leaf_mut().expect("descent ends at a leaf");
            leaf.remove_and_delete_record(key)
        };
        if !removed {
            self.remove_pages_in_transaction(OpType::Delete, txn)?;
            return Ok(false);
        }
        self.write_node(txn, &node)?;

        let needs_rebalance = if node.is_root() {
            // an emptied leaf root unroots the tree
            node.size() == 0
        } else {
            node.size() < node.min_size()
        };
        if needs_rebalance {
            self.coalesce_or_redistribute(node, txn)?;
        }
        self.remove_pages_in_transaction(OpType::Delete, txn)?;
        Ok(true)
    }

    /// Repair an underflowing node: prefer borrowing one entry from a
    /// sibling, merge when both fit in a single node. Returns whether the
    /// node was scheduled for deletion.
    fn coalesce_or_redistribute(
        &self,
        node: TreeNode<K, V>,
        txn: &mut Transaction,
    ) -> Result<bool, BTreeError> {
        if node.is_root() {
            let delete_root = self.adjust_root(&node, txn)?;
            if delete_root {
                txn.add_deleted_page(node.page_id());
            }
            return Ok(delete_root);
        }

        // pick the left sibling; the leftmost child falls back to its right
        // sibling
        let parent_id = node.parent_page_id();
        let parent = self.read_node(txn, parent_id)?;
        let (node_index, sibling_id) = {
            let internal = parent
                .as_internal()
                .ok_or(BTreeError::UnexpectedNodeKind(parent_id))?;
            let node_index = internal
                .value_index(node.page_id())
                .expect("child is registered in its parent");
            let sibling_index = if node_index > 0 { node_index - 1 } else { 1 };
            (node_index, internal.child_at(sibling_index))
        };

        // The sibling latch is taken while the parent is still held, so no
        // other writer can be restructuring it.
        let sibling = self.concurrent_fetch_page(sibling_id, OpType::Delete, false, txn)?;

        if node.size() + sibling.size() > node.max_size() {
            self.redistribute(parent, node, sibling, node_index, txn)?;
            return Ok(false);
        }

        // merge right into left
        let (left, right, right_index) = if node_index == 0 {
            (node, sibling, 1)
        } else {
            (sibling, node, node_index)
        };
        self.coalesce(parent, left, right, right_index, txn)?;
        Ok(true)
    }

    /// Move one entry from the sibling into the underflowing node and fix
    /// the parent's routing key
    fn redistribute(
        &self,
        mut parent: TreeNode<K, V>,
        mut node: TreeNode<K, V>,
        mut sibling: TreeNode<K, V>,
        node_index: usize,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let node_id = node.page_id();
        match (&mut node, &mut sibling) {
            (TreeNode::Leaf(node_leaf), TreeNode::Leaf(sibling_leaf)) => {
                let internal = parent
                    .as_internal_mut()
                    .ok_or(BTreeError::UnexpectedNodeKind(node_id))?;
                if node_index == 0 {
                    // sibling is on the right: take its first entry
                    let new_separator = sibling_leaf.move_first_to_end_of(node_leaf);
                    internal.set_routing_key_at(1, new_separator);
                } else {
                    // sibling is on the left: take its last entry
                    let new_separator = sibling_leaf.move_last_to_front_of(node_leaf);
                    internal.set_routing_key_at(node_index, new_separator);
                }
            }
            (TreeNode::Internal(node_internal), TreeNode::Internal(sibling_internal)) => {
                let internal = parent
                    .as_internal_mut()
                    .ok_or(BTreeError::UnexpectedNodeKind(node_id))?;
                let moved_child = if node_index == 0 {
                    let separator = internal.routing_key_at(1).clone();
                    let (moved, new_separator) =
                        sibling_internal.move_first_to_end_of(node_internal, separator);
                    internal.set_routing_key_at(1, new_separator);
                    moved
                } else {
                    let separator = internal.routing_key_at(node_index).clone();
                    let (moved, new_separator) =
                        sibling_internal.move_last_to_front_of(node_internal, separator);
                    internal.set_routing_key_at(node_index, new_separator);
                    moved
                };
                self.set_parent(txn, moved_child, node_id)?;
            }
            _ => return Err(BTreeError::UnexpectedNodeKind(node_id)),
        }

        log::debug!("redistributed between {} and {}", node_id, sibling.page_id());
        self.write_node(txn, &node)?;
        self.write_node(txn, &sibling)?;
        self.write_node(txn, &parent)?;
        Ok(())
    }

    /// Merge `right` into `left`, drop `right` from the parent, and keep
    /// rebalancing upward while the parent falls under its minimum
    fn coalesce(
        &self,
        mut parent: TreeNode<K, V>,
        mut left: TreeNode<K, V>,
        mut right: TreeNode<K, V>,
        right_index: usize,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let left_id = left.page_id();
        let right_id = right.page_id();

        match (&mut left, &mut right) {
            (TreeNode::Leaf(left_leaf), TreeNode::Leaf(right_leaf)) => {
                right_leaf.move_all_to(left_leaf);
            }
            (TreeNode::Internal(left_internal), TreeNode::Internal(right_internal)) => {
                // the separator becomes a real routing key between the halves
                let separator = parent
                    .as_internal()
                    .ok_or(BTreeError::UnexpectedNodeKind(right_id))?
                    .routing_key_at(right_index)
                    .clone();
                let moved_children = right_internal.children.clone();
                right_internal.move_all_to(left_internal, separator);
                for child in moved_children {
                    self.set_parent(txn, child, left_id)?;
                }
            }
            _ => return Err(BTreeError::UnexpectedNodeKind(right_id)),
        }

        txn.add_deleted_page(right_id);
        {
            let internal = parent
                .as_internal_mut()
                .ok_or(BTreeError::UnexpectedNodeKind(right_id))?;
            internal.remove(right_index);
        }
        self.write_node(txn, &left)?;
        self.write_node(txn, &parent)?;
        log::debug!("merged {} into {}", right_id, left_id);

        // Underflow threshold matches the descent's delete-safety
        // predicate (size > min_size): the deepest retained node may end
        // exactly at min_size, and its own parent is no longer latched.
        if parent.size() < parent.min_size() {
            self.coalesce_or_redistribute(parent, txn)?;
        }
        Ok(())
    }

    /// Shrink the root after a deletion: an emptied leaf root unroots the
    /// tree, a singular internal root promotes its only child
    fn adjust_root(&self, node: &TreeNode<K, V>, txn: &mut Transaction) -> Result<bool, BTreeError> {
        match node {
            TreeNode::Leaf(leaf) if leaf.size() == 0 => {
                self.set_root_page_id(INVALID_PAGE_ID);
                self.update_root_page_id(false)?;
                log::debug!("index {} is now empty", self.index_name);
                Ok(true)
            }
            TreeNode::Internal(internal) if internal.size() == 1 => {
                let child_id = internal.child_at(0);
                self.set_root_page_id(child_id);
                self.update_root_page_id(false)?;
                self.set_parent(txn, child_id, INVALID_PAGE_ID)?;
                log::debug!("index {} root collapsed to {}", self.index_name, child_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
