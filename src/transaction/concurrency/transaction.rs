use std::collections::HashSet;

use crate::common::types::{Page, PageId, PageReadGuard, PageWriteGuard, Rid, TxnId};

/// Transaction states under two-phase locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// A page latch held by a transaction during an index operation
pub enum PageLatch {
    Shared(PageReadGuard),
    Exclusive(PageWriteGuard),
}

impl PageLatch {
    pub fn page_id(&self) -> PageId {
        match self {
            PageLatch::Shared(guard) => guard.page_id,
            PageLatch::Exclusive(guard) => guard.page_id,
        }
    }
}

/// Transaction - per-client context for index operations and tuple locks.
/// Not shared between threads: lock-manager calls may block the owning
/// thread, and the page set tracks the latches of the operation in flight.
///
/// Lower transaction id = older = higher wait-die priority.
pub struct Transaction {
    id: TxnId,
    state: TransactionState,
    shared_lock_set: HashSet<Rid>,
    exclusive_lock_set: HashSet<Rid>,
    // Pages latched by the current index operation, root first
    page_set: Vec<PageLatch>,
    // Pages scheduled for deallocation at operation end
    deleted_page_set: HashSet<PageId>,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TransactionState::Growing,
            shared_lock_set: HashSet::new(),
            exclusive_lock_set: HashSet::new(),
            page_set: Vec::new(),
            deleted_page_set: HashSet::new(),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    pub fn shared_lock_set(&self) -> &HashSet<Rid> {
        &self.shared_lock_set
    }

    pub fn exclusive_lock_set(&self) -> &HashSet<Rid> {
        &self.exclusive_lock_set
    }

    pub(crate) fn shared_lock_set_mut(&mut self) -> &mut HashSet<Rid> {
        &mut self.shared_lock_set
    }

    pub(crate) fn exclusive_lock_set_mut(&mut self) -> &mut HashSet<Rid> {
        &mut self.exclusive_lock_set
    }

    /// Record a latched page, in traversal order
    pub(crate) fn add_latched_page(&mut self, latch: PageLatch) {
        self.page_set.push(latch);
    }

    /// Release-order drain of every latch held by the current operation
    pub(crate) fn take_latched_pages(&mut self) -> Vec<PageLatch> {
        std::mem::take(&mut self.page_set)
    }

    /// Mutable access to a write-latched page's contents
    pub(crate) fn page_data_mut(&mut self, page_id: PageId) -> Option<&mut Page> {
        self.page_set.iter_mut().find_map(|latch| match latch {
            PageLatch::Exclusive(guard) if guard.page_id == page_id => Some(&mut **guard),
            _ => None,
        })
    }

    /// Whether the current operation holds a write latch on the page
    pub(crate) fn holds_exclusive(&self, page_id: PageId) -> bool {
        self.page_set
            .iter()
            .any(|latch| matches!(latch, PageLatch::Exclusive(g) if g.page_id == page_id))
    }

    pub(crate) fn add_deleted_page(&mut self, page_id: PageId) {
        self.deleted_page_set.insert(page_id);
    }

    pub(crate) fn deleted_page_set(&self) -> &HashSet<PageId> {
        &self.deleted_page_set
    }

    pub(crate) fn remove_deleted_page(&mut self, page_id: PageId) {
        self.deleted_page_set.remove(&page_id);
    }
}
