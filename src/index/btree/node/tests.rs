use crate::common::types::{INVALID_PAGE_ID, PageId};
use super::{InternalNode, LeafNode, OpType, TreeNode};

fn leaf(page_id: PageId, keys: &[i32]) -> LeafNode<i32, u32> {
    let mut node = LeafNode::new(page_id, 1, 4);
    for &k in keys {
        node.insert(k, k as u32);
    }
    node
}

#[test]
fn test_leaf_insert_keeps_order() {
    let mut node: LeafNode<i32, u32> = LeafNode::new(2, INVALID_PAGE_ID, 4);
    node.insert(5, 50);
    node.insert(1, 10);
    node.insert(3, 30);
    let keys: Vec<i32> = node.entries.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![1, 3, 5]);
}

#[test]
fn test_leaf_lookup_and_remove() {
    let mut node = leaf(2, &[1, 3, 5]);
    assert_eq!(node.lookup(&3), Some(&3));
    assert_eq!(node.lookup(&4), None);
    assert!(node.remove_and_delete_record(&3));
    assert!(!node.remove_and_delete_record(&3));
    assert_eq!(node.size(), 2);
}

#[test]
fn test_leaf_key_index_is_lower_bound() {
    let node = leaf(2, &[10, 20, 30]);
    assert_eq!(node.key_index(&5), 0);
    assert_eq!(node.key_index(&10), 0);
    assert_eq!(node.key_index(&15), 1);
    assert_eq!(node.key_index(&35), 3);
}

#[test]
fn test_leaf_split_links_sibling_chain() {
    let mut node = leaf(2, &[1, 2, 3, 4]);
    node.next_page_id = 9;
    let mut sibling: LeafNode<i32, u32> = LeafNode::new(7, 1, 4);
    let separator = node.move_half_to(&mut sibling);

    assert_eq!(separator, 3);
    assert_eq!(node.size(), 2);
    assert_eq!(sibling.size(), 2);
    assert_eq!(node.next_page_id, 7);
    assert_eq!(sibling.next_page_id, 9);
}

#[test]
fn test_leaf_redistribution_moves() {
    let mut left = leaf(2, &[1, 2]);
    let mut right = leaf(3, &[5, 6, 7]);

    // borrow from the right sibling
    let new_sep = right.move_first_to_end_of(&mut left);
    assert_eq!(new_sep, 6);
    assert_eq!(left.entries.last().unwrap().0, 5);

    // and give it back
    let new_sep = left.move_last_to_front_of(&mut right);
    assert_eq!(new_sep, 5);
    assert_eq!(right.first_key(), &5);
}

#[test]
fn test_internal_lookup_routes_by_key() {
    let mut node: InternalNode<i32> = InternalNode::new(1, INVALID_PAGE_ID, 4);
    node.populate_new_root(10, 5, 11);
    node.insert_node_after(11, 9, 12);

    assert_eq!(node.lookup(&1), 10);
    assert_eq!(node.lookup(&5), 11);
    assert_eq!(node.lookup(&7), 11);
    assert_eq!(node.lookup(&9), 12);
    assert_eq!(node.lookup(&100), 12);
}

#[test]
fn test_internal_insert_after_and_remove() {
    let mut node: InternalNode<i32> = InternalNode::new(1, INVALID_PAGE_ID, 4);
    node.populate_new_root(10, 5, 11);
    let size = node.insert_node_after(10, 3, 15);
    assert_eq!(size, 3);
    assert_eq!(node.children, vec![10, 15, 11]);
    assert_eq!(node.keys, vec![3, 5]);

    node.remove(1);
    assert_eq!(node.children, vec![10, 11]);
    assert_eq!(node.keys, vec![5]);
}

#[test]
fn test_internal_split_pushes_middle_key() {
    let mut node: InternalNode<i32> = InternalNode::new(1, INVALID_PAGE_ID, 3);
    node.children = vec![10, 11, 12, 13];
    node.keys = vec![5, 9, 13];

    let mut sibling: InternalNode<i32> = InternalNode::new(2, INVALID_PAGE_ID, 3);
    let separator = node.move_half_to(&mut sibling);

    assert_eq!(separator, 9);
    assert_eq!(node.children, vec![10, 11]);
    assert_eq!(node.keys, vec![5]);
    assert_eq!(sibling.children, vec![12, 13]);
    assert_eq!(sibling.keys, vec![13]);
}

#[test]
fn test_internal_merge_threads_separator() {
    let mut left: InternalNode<i32> = InternalNode::new(1, 0, 4);
    left.children = vec![10, 11];
    left.keys = vec![5];
    let mut right: InternalNode<i32> = InternalNode::new(2, 0, 4);
    right.children = vec![12, 13];
    right.keys = vec![20];

    right.move_all_to(&mut left, 9);
    assert_eq!(left.children, vec![10, 11, 12, 13]);
    assert_eq!(left.keys, vec![5, 9, 20]);
    assert_eq!(right.size(), 0);
}

#[test]
fn test_internal_redistribution_threads_keys() {
    let mut left: InternalNode<i32> = InternalNode::new(1, 0, 4);
    left.children = vec![10, 11];
    left.keys = vec![5];
    let mut right: InternalNode<i32> = InternalNode::new(2, 0, 4);
    right.children = vec![12, 13, 14];
    right.keys = vec![20, 30];

    // separator between them is 9
    let (moved, new_sep) = right.move_first_to_end_of(&mut left, 9);
    assert_eq!(moved, 12);
    assert_eq!(new_sep, 20);
    assert_eq!(left.children, vec![10, 11, 12]);
    assert_eq!(left.keys, vec![5, 9]);

    let (moved, new_sep) = left.move_last_to_front_of(&mut right, 20);
    assert_eq!(moved, 12);
    assert_eq!(new_sep, 9);
    assert_eq!(right.children, vec![12, 13, 14]);
    assert_eq!(right.keys, vec![20, 30]);
}

#[test]
fn test_only_child_collapse() {
    let mut root: InternalNode<i32> = InternalNode::new(1, INVALID_PAGE_ID, 4);
    root.children = vec![10];
    root.keys = vec![];
    assert_eq!(root.remove_and_return_only_child(), 10);
    assert_eq!(root.size(), 0);
}

#[test]
fn test_safety_predicate() {
    let mut l = leaf(2, &[1, 2]);
    l.header.parent_page_id = 1;
    let node: TreeNode<i32, u32> = TreeNode::Leaf(l);
    assert!(node.is_safe(OpType::Read));
    // max_size 4: room to insert, but at min_size 2 a delete would underflow
    assert!(node.is_safe(OpType::Insert));
    assert!(!node.is_safe(OpType::Delete));

    let mut root_leaf = leaf(2, &[1, 2]);
    root_leaf.header.parent_page_id = INVALID_PAGE_ID;
    let root: TreeNode<i32, u32> = TreeNode::Leaf(root_leaf);
    assert!(root.is_safe(OpType::Delete));
}
