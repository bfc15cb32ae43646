use std::collections::VecDeque;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::types::{Page, PagePtr, PageId, FrameId, INVALID_PAGE_ID};
use crate::storage::disk::DiskManager;
use crate::storage::hash::ExtendibleHashTable;
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;

/// Bucket capacity of the extendible-hash page table
const PAGE_TABLE_BUCKET_SIZE: usize = 64;

struct FrameMeta {
    page: PagePtr,
    pin_count: u32,
    is_dirty: bool,
}

struct PoolInner {
    frames: Vec<FrameMeta>,
    free_list: VecDeque<FrameId>,
    replacer: LruReplacer<FrameId>,
}

/// Buffer pool manager: owns a fixed array of page frames, a free list, the
/// LRU replacer and the extendible-hash page table, and mediates all page
/// access against the disk manager.
///
/// A single latch serialises the public operations. The page table carries
/// its own internal mutex, taken only while the pool latch is held.
pub struct BufferPoolManager {
    pool_size: usize,
    page_table: ExtendibleHashTable<PageId, FrameId>,
    disk_manager: Arc<dyn DiskManager>,
    latch: Mutex<PoolInner>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(FrameMeta {
                page: Arc::new(parking_lot::RwLock::new(Page::new(INVALID_PAGE_ID))),
                pin_count: 0,
                is_dirty: false,
            });
            free_list.push_back(i as FrameId);
        }

        Self {
            pool_size,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            disk_manager,
            latch: Mutex::new(PoolInner {
                frames,
                free_list,
                replacer: LruReplacer::new(),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Whether the page currently resides in the pool (test/debug aid)
    pub fn contains(&self, page_id: PageId) -> bool {
        let _inner = self.latch.lock();
        self.page_table.find(&page_id).is_some()
    }

    /// Fetch a page, reading it from disk on a miss. The returned page is
    /// pinned; the caller must `unpin_page` it when done.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidPageId(page_id));
        }
        log::trace!("fetch page {}", page_id);

        let mut inner = self.latch.lock();
        if let Some(frame_id) = self.page_table.find(&page_id) {
            inner.replacer.erase(&frame_id);
            let frame = &mut inner.frames[frame_id as usize];
            frame.pin_count += 1;
            return Ok(frame.page.clone());
        }

        let frame_id = Self::acquire_free_frame(&mut inner)?;
        self.evict_frame_contents(&mut inner, frame_id)?;

        self.page_table.insert(page_id, frame_id);
        let frame = &mut inner.frames[frame_id as usize];
        {
            let mut page = frame.page.write();
            page.page_id = page_id;
            self.disk_manager.read_page(page_id, &mut page.data)?;
        }
        frame.pin_count = 1;
        frame.is_dirty = false;
        Ok(frame.page.clone())
    }

    /// Allocate a fresh page on disk and bind it to a frame, zeroed and
    /// pinned. Fails with `PoolExhausted` when every frame is pinned.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut inner = self.latch.lock();
        let frame_id = Self::acquire_free_frame(&mut inner)?;
        let page_id = self.disk_manager.allocate_page()?;
        log::trace!("new page {}", page_id);

        self.evict_frame_contents(&mut inner, frame_id)?;
        self.page_table.insert(page_id, frame_id);

        let frame = &mut inner.frames[frame_id as usize];
        {
            let mut page = frame.page.write();
            page.reset();
            page.page_id = page_id;
        }
        frame.pin_count = 1;
        frame.is_dirty = false;
        Ok((frame.page.clone(), page_id))
    }

    /// Drop one pin on the page, OR-ing in the dirty flag. Once the pin
    /// count reaches zero the frame becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let mut inner = self.latch.lock();
        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let pin_count = {
            let frame = &mut inner.frames[frame_id as usize];
            if frame.pin_count == 0 {
                return Err(BufferPoolError::PageNotPinned(page_id));
            }
            frame.is_dirty |= is_dirty;
            frame.pin_count -= 1;
            frame.pin_count
        };
        if pin_count == 0 {
            inner.replacer.insert(frame_id);
        }
        Ok(())
    }

    /// Write the page's bytes out and clear its dirty flag
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidPageId(page_id));
        }
        let mut inner = self.latch.lock();
        let frame_id = self
            .page_table
            .find(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &mut inner.frames[frame_id as usize];
        {
            let page = frame.page.read();
            self.disk_manager.write_page(page_id, &page.data)?;
        }
        frame.is_dirty = false;
        Ok(())
    }

    /// Write back every unpinned dirty frame
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut inner = self.latch.lock();
        for frame in inner.frames.iter_mut() {
            if frame.pin_count == 0 && frame.is_dirty {
                let page_id = {
                    let page = frame.page.read();
                    if page.page_id == INVALID_PAGE_ID {
                        continue;
                    }
                    self.disk_manager.write_page(page.page_id, &page.data)?;
                    page.page_id
                };
                frame.is_dirty = false;
                log::trace!("flushed page {}", page_id);
            }
        }
        Ok(())
    }

    /// Drop the page from the pool (fails while pinned) and deallocate it
    /// on disk. A page absent from the pool is still deallocated.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidPageId(page_id));
        }
        log::trace!("delete page {}", page_id);

        let mut inner = self.latch.lock();
        if let Some(frame_id) = self.page_table.find(&page_id) {
            {
                let frame = &mut inner.frames[frame_id as usize];
                if frame.pin_count > 0 {
                    return Err(BufferPoolError::PagePinned(page_id));
                }
                let mut page = frame.page.write();
                page.reset();
                frame.is_dirty = false;
            }
            self.page_table.remove(&page_id);
            inner.replacer.erase(&frame_id);
            inner.free_list.push_back(frame_id);
        }
        self.disk_manager.deallocate_page(page_id)?;
        Ok(())
    }

    /// Free-frame policy: always draw from the free list before asking the
    /// replacer for a victim
    fn acquire_free_frame(inner: &mut PoolInner) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }
        inner
            .replacer
            .victim()
            .ok_or(BufferPoolError::PoolExhausted)
    }

    /// Flush the frame's outgoing page if dirty and unmap it from the page
    /// table, leaving the frame ready for a new identity
    fn evict_frame_contents(
        &self,
        inner: &mut PoolInner,
        frame_id: FrameId,
    ) -> Result<(), BufferPoolError> {
        let frame = &mut inner.frames[frame_id as usize];
        let old_page_id = frame.page.read().page_id;
        if old_page_id == INVALID_PAGE_ID {
            return Ok(());
        }
        if frame.is_dirty {
            let page = frame.page.read();
            self.disk_manager.write_page(old_page_id, &page.data)?;
        }
        frame.is_dirty = false;
        self.page_table.remove(&old_page_id);
        log::trace!("evicted page {} from frame {}", old_page_id, frame_id);
        Ok(())
    }
}
