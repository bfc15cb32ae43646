use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::rwlatch::RwLatch;
use crate::common::types::{PageId, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::page::HeaderPage;
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{OpType, TreeNode};
use crate::index::btree::serialization::{
    default_internal_max_size, default_leaf_max_size, deserialize_node, serialize_node,
};
use crate::transaction::concurrency::{PageLatch, Transaction};

thread_local! {
    // Nested root-latch acquisitions within one index operation on this
    // thread; release happens exactly once per acquisition
    static ROOT_LOCKED_CNT: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LatchMode {
    Shared,
    Exclusive,
}

pub(crate) fn latch_mode(op: OpType) -> LatchMode {
    if op == OpType::Read {
        LatchMode::Shared
    } else {
        LatchMode::Exclusive
    }
}

/// Concurrent B+ tree index over the buffer pool.
///
/// Internal pages route the search, leaf pages hold the data:
/// (1) keys are unique,
/// (2) insert and remove grow and shrink the structure dynamically,
/// (3) an iterator provides ordered range scans over the leaf chain.
///
/// Concurrency follows latch crabbing: the descent write-latches the path
/// for inserts and deletes and releases every ancestor as soon as the
/// freshly latched child cannot propagate a structural change upward;
/// reads release each parent as soon as the child is latched. A tree-wide
/// reader/writer latch guards the observation of `root_page_id`.
pub struct BPlusTree<K, V> {
    pub(crate) index_name: String,
    pub(crate) buffer_pool: Arc<BufferPoolManager>,
    root_page_id: AtomicU32,
    root_latch: RwLatch,
    pub(crate) leaf_max_size: usize,
    pub(crate) internal_max_size: usize,
    _phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> BPlusTree<K, V>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open (or create) the named index, with node capacities derived from
    /// the key and value widths
    pub fn new(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
    ) -> Result<Self, BTreeError> {
        Self::with_max_sizes(
            name,
            buffer_pool,
            default_leaf_max_size::<K, V>(),
            default_internal_max_size::<K>(),
        )
    }

    /// Open (or create) the named index with explicit node capacities
    pub fn with_max_sizes(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        assert!(leaf_max_size >= 2, "leaf nodes need room to split");
        assert!(internal_max_size >= 3, "internal nodes need room to split");
        let index_name = name.into();

        // A previously created index resumes from its persisted root
        let root_page_id = {
            let header = buffer_pool.fetch_page(HEADER_PAGE_ID)?;
            let persisted = {
                let mut guard = header.write();
                HeaderPage::new(&mut guard.data).get_record(&index_name)
            };
            buffer_pool.unpin_page(HEADER_PAGE_ID, false)?;
            persisted.unwrap_or(INVALID_PAGE_ID)
        };

        Ok(Self {
            index_name,
            buffer_pool,
            root_page_id: AtomicU32::new(root_page_id),
            root_latch: RwLatch::new(),
            leaf_max_size,
            internal_max_size,
            _phantom: PhantomData,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_root_page_id(&self, page_id: PageId) {
        self.root_page_id.store(page_id, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id() == INVALID_PAGE_ID
    }

    /// Point lookup. Descends with read crabbing, so at most one page is
    /// latched at a time.
    pub fn get_value(
        &self,
        key: &K,
        txn: Option<&mut Transaction>,
    ) -> Result<Option<V>, BTreeError> {
        let mut scratch = Transaction::new(0);
        let txn = txn.unwrap_or(&mut scratch);

        let result = match self.find_leaf_page(Some(key), OpType::Read, txn)? {
            None => None,
            Some((_, node)) => {
                let leaf = node.as_leaf().expect("descent ends at a leaf");
                leaf.lookup(key).cloned()
            }
        };
        self.remove_pages_in_transaction(OpType::Read, txn)?;
        Ok(result)
    }

    /// Descend from the root to the leaf responsible for `key` (or the
    /// leftmost leaf when `key` is None), applying latch crabbing. Returns
    /// None when the tree is empty. The leaf's latch is the last entry of
    /// the transaction's page set.
    pub(crate) fn find_leaf_page(
        &self,
        key: Option<&K>,
        op: OpType,
        txn: &mut Transaction,
    ) -> Result<Option<(PageId, TreeNode<K, V>)>, BTreeError> {
        let mode = latch_mode(op);
        self.lock_root(mode);
        if self.is_empty() {
            self.unlock_root(mode);
            return Ok(None);
        }

        let mut page_id = self.root_page_id();
        let mut node = self.concurrent_fetch_page(page_id, op, false, txn)?;
        while let Some(internal) = node.as_internal() {
            let next_id = match key {
                Some(key) => internal.lookup(key),
                None => internal.child_at(0),
            };
            node = self.concurrent_fetch_page(next_id, op, true, txn)?;
            page_id = next_id;
        }
        Ok(Some((page_id, node)))
    }

    /// Fetch and latch one page of the descent. For reads, and for writes
    /// once the newly latched child is safe, every previously held page
    /// (and the root latch) is released first.
    pub(crate) fn concurrent_fetch_page(
        &self,
        page_id: PageId,
        op: OpType,
        has_previous: bool,
        txn: &mut Transaction,
    ) -> Result<TreeNode<K, V>, BTreeError> {
        let page = self
            .buffer_pool
            .fetch_page(page_id)
            .map_err(Self::map_pool_error)?;
        let latch = match latch_mode(op) {
            LatchMode::Shared => PageLatch::Shared(page.read_arc()),
            LatchMode::Exclusive => PageLatch::Exclusive(page.write_arc()),
        };
        let decoded: Result<TreeNode<K, V>, BTreeError> = match &latch {
            PageLatch::Shared(guard) => deserialize_node(guard),
            PageLatch::Exclusive(guard) => deserialize_node(guard),
        };
        let node = match decoded {
            Ok(node) => node,
            Err(error) => {
                drop(latch);
                self.buffer_pool.unpin_page(page_id, false)?;
                return Err(error);
            }
        };
        if has_previous && (op == OpType::Read || node.is_safe(op)) {
            self.remove_pages_in_transaction(op, txn)?;
        }
        txn.add_latched_page(latch);
        Ok(node)
    }

    /// Release every page latch held by the operation in traversal order,
    /// unpin the frames (dirty for writes), and deallocate the pages the
    /// operation scheduled for deletion. Also releases the root latch if
    /// this operation still holds it.
    pub(crate) fn remove_pages_in_transaction(
        &self,
        op: OpType,
        txn: &mut Transaction,
    ) -> Result<(), BTreeError> {
        let mode = latch_mode(op);
        self.unlock_root(mode);
        let dirty = mode == LatchMode::Exclusive;
        for latch in txn.take_latched_pages() {
            let page_id = latch.page_id();
            drop(latch);
            self.buffer_pool.unpin_page(page_id, dirty)?;
            if txn.deleted_page_set().contains(&page_id) {
                // an iterator may still be dropping its pin; the page stays
                // allocated in that case
                if let Err(error) = self.buffer_pool.delete_page(page_id) {
                    log::warn!("deferred delete of page {} failed: {}", page_id, error);
                }
                txn.remove_deleted_page(page_id);
            }
        }
        Ok(())
    }

    pub(crate) fn lock_root(&self, mode: LatchMode) {
        match mode {
            LatchMode::Shared => self.root_latch.r_lock(),
            LatchMode::Exclusive => self.root_latch.w_lock(),
        }
        ROOT_LOCKED_CNT.with(|cnt| cnt.set(cnt.get() + 1));
    }

    pub(crate) fn unlock_root(&self, mode: LatchMode) {
        let held = ROOT_LOCKED_CNT.with(|cnt| {
            if cnt.get() == 0 {
                false
            } else {
                cnt.set(cnt.get() - 1);
                true
            }
        });
        if held {
            match mode {
                LatchMode::Shared => self.root_latch.r_unlock(),
                LatchMode::Exclusive => self.root_latch.w_unlock(),
            }
        }
    }

    /// Re-decode a node from a page this operation already write-latched
    pub(crate) fn read_node(
        &self,
        txn: &mut Transaction,
        page_id: PageId,
    ) -> Result<TreeNode<K, V>, BTreeError> {
        let page = txn
            .page_data_mut(page_id)
            .expect("page is write-latched by this operation");
        deserialize_node(page)
    }

    /// Serialize a node back into its write-latched page
    pub(crate) fn write_node(
        &self,
        txn: &mut Transaction,
        node: &TreeNode<K, V>,
    ) -> Result<(), BTreeError> {
        let page = txn
            .page_data_mut(node.page_id())
            .expect("page is write-latched by this operation");
        serialize_node(node, page)
    }

    /// Rewrite a node's parent pointer, through the held latch when this
    /// operation owns one, or under a transient latch otherwise (safe: the
    /// subtree is isolated by the ancestors this operation still holds)
    pub(crate) fn set_parent(
        &self,
        txn: &mut Transaction,
        page_id: PageId,
        parent_id: PageId,
    ) -> Result<(), BTreeError> {
        if txn.holds_exclusive(page_id) {
            let page = txn
                .page_data_mut(page_id)
                .expect("exclusive latch implies page access");
            let mut node: TreeNode<K, V> = deserialize_node(page)?;
            node.header_mut().parent_page_id = parent_id;
            return serialize_node(&node, page);
        }

        let page = self
            .buffer_pool
            .fetch_page(page_id)
            .map_err(Self::map_pool_error)?;
        let write_result = {
            let mut guard = page.write();
            deserialize_node::<K, V>(&guard).and_then(|mut node| {
                node.header_mut().parent_page_id = parent_id;
                serialize_node(&node, &mut guard)
            })
        };
        self.buffer_pool.unpin_page(page_id, true)?;
        write_result
    }

    /// Persist the current root page id in the header page; `insert_record`
    /// registers the index name on first creation
    pub(crate) fn update_root_page_id(&self, insert_record: bool) -> Result<(), BTreeError> {
        let header = self
            .buffer_pool
            .fetch_page(HEADER_PAGE_ID)
            .map_err(Self::map_pool_error)?;
        {
            let mut guard = header.write();
            let mut header_page = HeaderPage::new(&mut guard.data);
            let root = self.root_page_id();
            if insert_record {
                if !header_page.insert_record(&self.index_name, root) {
                    header_page.update_record(&self.index_name, root);
                }
            } else if !header_page.update_record(&self.index_name, root) {
                header_page.insert_record(&self.index_name, root);
            }
        }
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, true)?;
        Ok(())
    }

    /// Capacity exhaustion while growing the tree is fatal to the
    /// operation; everything else passes through
    pub(crate) fn map_pool_error(error: BufferPoolError) -> BTreeError {
        match error {
            BufferPoolError::PoolExhausted => BTreeError::OutOfMemory,
            other => BTreeError::BufferPoolError(other),
        }
    }
}
