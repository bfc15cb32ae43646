// Export public modules
pub mod common;
pub mod storage;
pub mod index;
pub mod transaction;

// Re-export key items for convenient access
pub use common::types::{Page, PagePtr, PageId, Rid, PAGE_SIZE, INVALID_PAGE_ID, HEADER_PAGE_ID};
pub use storage::buffer::BufferPoolManager;
pub use storage::buffer::BufferPoolError;
pub use storage::disk::{DiskManager, FileDiskManager};
pub use storage::hash::ExtendibleHashTable;
pub use index::btree::BPlusTree;
pub use transaction::concurrency::{LockManager, Transaction, TransactionManager, TransactionState};
