use std::sync::Arc;
use parking_lot::RwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use serde::{Serialize, Deserialize};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
pub type PageId = u32;

/// Sentinel for "no page"
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// Page 0 holds the directory of named index roots
pub const HEADER_PAGE_ID: PageId = 0;

/// Transaction ID type
pub type TxnId = u32;

/// Buffer pool frame ID type
pub type FrameId = u32;

/// Record ID: locates a tuple as (page, slot). The lock manager treats it
/// as an opaque hashable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

/// Page structure: a fixed-size byte buffer plus its current identity.
/// Pin count and dirty flag live in the buffer pool's frame metadata.
#[derive(Debug)]
pub struct Page {
    pub data: Box<[u8; PAGE_SIZE]>,
    pub page_id: PageId,
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            data: Box::new([0; PAGE_SIZE]),
            page_id,
        }
    }

    pub fn reset(&mut self) {
        self.data.fill(0);
        self.page_id = INVALID_PAGE_ID;
    }
}

/// Smart pointer to a page. The RwLock is the page latch: readers and
/// writers take it for the duration of their access, and the B+ tree holds
/// owned guards across call frames while crabbing.
pub type PagePtr = Arc<RwLock<Page>>;

/// Owned page-latch guards (liberated from the borrow of the Arc, so they
/// can be stored in a transaction's page set)
pub type PageReadGuard = ArcRwLockReadGuard<parking_lot::RawRwLock, Page>;
pub type PageWriteGuard = ArcRwLockWriteGuard<parking_lot::RawRwLock, Page>;
