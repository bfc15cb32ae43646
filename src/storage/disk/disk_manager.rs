use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write, Seek, SeekFrom};
use std::path::Path;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// Block I/O and page allocation, consumed by the buffer pool. The buffer
/// pool never touches the disk except through this trait.
pub trait DiskManager: Send + Sync {
    /// Fill `buf` with the page's contents
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<(), DiskManagerError>;

    /// Persist `buf` as the page's contents
    fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<(), DiskManagerError>;

    /// Assign a fresh page id
    fn allocate_page(&self) -> Result<PageId, DiskManagerError>;

    /// Release a page id for future reuse
    fn deallocate_page(&self, page_id: PageId) -> Result<(), DiskManagerError>;
}

struct FileState {
    file: File,
    next_page_id: PageId,
    freed: BTreeSet<PageId>,
}

/// DiskManager backed by a single database file, one fixed-size page per
/// slot. Page 0 is the header page and is never handed out by the
/// allocator.
pub struct FileDiskManager {
    state: Mutex<FileState>,
}

impl FileDiskManager {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&db_path)?;

        // Resume allocation after the highest page the file already holds
        let file_size = file.metadata()?.len();
        let next_page_id = (file_size / PAGE_SIZE as u64).max(1) as PageId;
        log::debug!("opened database file, next page id {}", next_page_id);

        Ok(Self {
            state: Mutex::new(FileState {
                file,
                next_page_id,
                freed: BTreeSet::new(),
            }),
        })
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = Self::page_offset(page_id);
        let mut state = self.state.lock();

        // A page that was allocated but never written reads back as zeroes
        let file_size = state.file.metadata()?.len();
        if offset >= file_size {
            buf.fill(0);
            return Ok(());
        }

        state.file.seek(SeekFrom::Start(offset))?;
        state.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = Self::page_offset(page_id);
        let mut state = self.state.lock();
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(buf)?;
        state.file.flush()?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, DiskManagerError> {
        let mut state = self.state.lock();
        if let Some(&page_id) = state.freed.iter().next() {
            state.freed.remove(&page_id);
            return Ok(page_id);
        }
        let page_id = state.next_page_id;
        state.next_page_id += 1;
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }
        let mut state = self.state.lock();
        state.freed.insert(page_id);
        Ok(())
    }
}
