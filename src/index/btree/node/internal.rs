use serde::{Serialize, Deserialize};

use crate::common::types::PageId;
use super::NodeHeader;

/// Internal node: `children[i]` holds keys in `[keys[i-1], keys[i])`;
/// `children[0]` is the leftmost pointer with no key of its own. Node size
/// is `children.len()` and `keys.len() == children.len() - 1` whenever the
/// node is non-empty.
#[derive(Debug, Serialize, Deserialize)]
pub struct InternalNode<K> {
    pub header: NodeHeader,
    pub keys: Vec<K>,
    pub children: Vec<PageId>,
}

impl<K: Clone + Ord> InternalNode<K> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        Self {
            header: NodeHeader::new(page_id, parent_page_id, max_size),
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.children.len()
    }

    /// Child pointer to follow for `key`: the child after the greatest
    /// routing key not exceeding `key`
    pub fn lookup(&self, key: &K) -> PageId {
        let index = self.keys.partition_point(|k| k <= key);
        self.children[index]
    }

    /// Position of `child` among the child pointers
    pub fn value_index(&self, child: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    pub fn child_at(&self, index: usize) -> PageId {
        self.children[index]
    }

    /// Routing key guarding `children[child_index]` (child_index >= 1)
    pub fn routing_key_at(&self, child_index: usize) -> &K {
        &self.keys[child_index - 1]
    }

    pub fn set_routing_key_at(&mut self, child_index: usize, key: K) {
        self.keys[child_index - 1] = key;
    }

    /// Insert `(key, new_child)` right after `old_child`; returns the new
    /// size
    pub fn insert_node_after(&mut self, old_child: PageId, key: K, new_child: PageId) -> usize {
        let index = self
            .value_index(old_child)
            .expect("old child must be present")
            + 1;
        self.children.insert(index, new_child);
        self.keys.insert(index - 1, key);
        self.size()
    }

    /// Initialise this node as the root produced by a root split
    pub fn populate_new_root(&mut self, left_child: PageId, key: K, right_child: PageId) {
        self.keys = vec![key];
        self.children = vec![left_child, right_child];
    }

    /// Move the upper half of the entries into `recipient` (a fresh node)
    /// and return the separator key to push into the parent. The caller
    /// re-parents the moved children listed in `recipient.children`.
    pub fn move_half_to(&mut self, recipient: &mut InternalNode<K>) -> K {
        let split_at = self.children.len() / 2;
        recipient.children = self.children.split_off(split_at);
        let mut moved_keys = self.keys.split_off(split_at - 1);
        let separator = moved_keys.remove(0);
        recipient.keys = moved_keys;
        separator
    }

    /// Merge every entry into `recipient` (the left sibling); `separator`
    /// is the parent's routing key for this node, which becomes a real
    /// routing key between the merged halves. The caller re-parents the
    /// moved children.
    pub fn move_all_to(&mut self, recipient: &mut InternalNode<K>, separator: K) {
        recipient.keys.push(separator);
        recipient.keys.append(&mut self.keys);
        recipient.children.append(&mut self.children);
    }

    /// Shift this node's first child to the end of `recipient` (the left
    /// sibling); `separator` is the parent's routing key for this node.
    /// Returns the moved child and the parent's replacement routing key.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalNode<K>,
        separator: K,
    ) -> (PageId, K) {
        let moved = self.children.remove(0);
        recipient.keys.push(separator);
        recipient.children.push(moved);
        let new_separator = self.keys.remove(0);
        (moved, new_separator)
    }

    /// Shift this node's last child to the front of `recipient` (the right
    /// sibling); `separator` is the parent's routing key for `recipient`.
    /// Returns the moved child and the parent's replacement routing key.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalNode<K>,
        separator: K,
    ) -> (PageId, K) {
        let moved = self.children.pop().expect("node has children");
        recipient.children.insert(0, moved);
        recipient.keys.insert(0, separator);
        let new_separator = self.keys.pop().expect("node has keys");
        (moved, new_separator)
    }

    /// Drop the child at `index` and its routing key
    pub fn remove(&mut self, index: usize) {
        self.children.remove(index);
        if index > 0 {
            self.keys.remove(index - 1);
        } else if !self.keys.is_empty() {
            self.keys.remove(0);
        }
    }

    /// Collapse a singular root: drop the node's only remaining child
    /// pointer and hand it back
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        debug_assert_eq!(self.children.len(), 1);
        self.keys.clear();
        self.children.pop().expect("root keeps its last child")
    }
}
