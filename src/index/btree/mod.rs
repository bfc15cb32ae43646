pub mod error;
pub mod node;
pub mod index;
pub mod serialization;

pub use error::BTreeError;
pub use index::{BPlusTree, TreeIterator};
pub use node::{InternalNode, LeafNode, OpType, TreeNode};
pub use serialization::{serialize_node, deserialize_node};
