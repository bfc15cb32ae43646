use serde::{Serialize, Deserialize};

use crate::common::types::{PageId, INVALID_PAGE_ID};
use super::NodeHeader;

/// Leaf node: key/value entries sorted strictly ascending, plus the forward
/// sibling chain for range scans.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeafNode<K, V> {
    pub header: NodeHeader,
    pub entries: Vec<(K, V)>,
    pub next_page_id: PageId,
}

impl<K: Clone + Ord, V: Clone> LeafNode<K, V> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: usize) -> Self {
        Self {
            header: NodeHeader::new(page_id, parent_page_id, max_size),
            entries: Vec::new(),
            next_page_id: INVALID_PAGE_ID,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Lower bound: smallest index whose key is >= `key`
    pub fn key_index(&self, key: &K) -> usize {
        self.entries.partition_point(|(k, _)| k < key)
    }

    pub fn key_at(&self, index: usize) -> &K {
        &self.entries[index].0
    }

    pub fn first_key(&self) -> &K {
        &self.entries[0].0
    }

    pub fn lookup(&self, key: &K) -> Option<&V> {
        let index = self.key_index(key);
        match self.entries.get(index) {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        }
    }

    /// Insert in sort order; the caller has already ruled out a duplicate.
    /// Returns the new size.
    pub fn insert(&mut self, key: K, value: V) -> usize {
        let index = self.key_index(&key);
        self.entries.insert(index, (key, value));
        self.size()
    }

    /// Remove the entry for `key`, keeping the array compact; false when
    /// the key is absent
    pub fn remove_and_delete_record(&mut self, key: &K) -> bool {
        let index = self.key_index(key);
        match self.entries.get(index) {
            Some((k, _)) if k == key => {
                self.entries.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Move the upper half of the entries into `recipient` (a fresh node)
    /// and splice it into the sibling chain. Returns the separator key for
    /// the parent: the recipient's first key.
    pub fn move_half_to(&mut self, recipient: &mut LeafNode<K, V>) -> K {
        let split_at = self.entries.len() / 2;
        recipient.entries = self.entries.split_off(split_at);
        recipient.next_page_id = self.next_page_id;
        self.next_page_id = recipient.header.page_id;
        recipient.first_key().clone()
    }

    /// Merge every entry into `recipient` (the left sibling) and unlink
    /// this node from the sibling chain
    pub fn move_all_to(&mut self, recipient: &mut LeafNode<K, V>) {
        recipient.entries.append(&mut self.entries);
        recipient.next_page_id = self.next_page_id;
    }

    /// Shift this node's first entry to the end of `recipient` (the left
    /// sibling); returns the parent's replacement routing key for this node
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafNode<K, V>) -> K {
        let moved = self.entries.remove(0);
        recipient.entries.push(moved);
        self.first_key().clone()
    }

    /// Shift this node's last entry to the front of `recipient` (the right
    /// sibling); returns the parent's replacement routing key for
    /// `recipient`
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafNode<K, V>) -> K {
        let moved = self.entries.pop().expect("leaf has entries");
        recipient.entries.insert(0, moved);
        recipient.first_key().clone()
    }
}
