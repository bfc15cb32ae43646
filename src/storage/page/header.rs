use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageId, PAGE_SIZE};

const COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;
const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// View over the header page (page id 0): a directory of
/// `index_name -> root_page_id` records.
///
/// Layout: record count (u32), then fixed-size records of a zero-padded
/// 32-byte name followed by the root page id. A zeroed page decodes as an
/// empty directory.
pub struct HeaderPage<'a> {
    data: &'a mut [u8; PAGE_SIZE],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { data }
    }

    pub fn record_count(&self) -> u32 {
        LittleEndian::read_u32(&self.data[COUNT_OFFSET..COUNT_OFFSET + 4])
    }

    fn set_record_count(&mut self, count: u32) {
        LittleEndian::write_u32(&mut self.data[COUNT_OFFSET..COUNT_OFFSET + 4], count);
    }

    fn record_offset(index: usize) -> usize {
        RECORDS_OFFSET + index * RECORD_SIZE
    }

    fn name_at(&self, index: usize) -> &[u8] {
        let offset = Self::record_offset(index);
        let name = &self.data[offset..offset + NAME_SIZE];
        let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &name[..end]
    }

    fn find_record(&self, name: &str) -> Option<usize> {
        (0..self.record_count() as usize).find(|&i| self.name_at(i) == name.as_bytes())
    }

    /// Register a new `name -> root` record; false when the name is taken,
    /// too long, or the directory is full
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        let count = self.record_count() as usize;
        if name.len() > NAME_SIZE || count >= MAX_RECORDS || self.find_record(name).is_some() {
            return false;
        }
        let offset = Self::record_offset(count);
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        LittleEndian::write_u32(
            &mut self.data[offset + NAME_SIZE..offset + RECORD_SIZE],
            root_page_id,
        );
        self.set_record_count(count as u32 + 1);
        true
    }

    /// Overwrite the root page id of an existing record
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match self.find_record(name) {
            Some(index) => {
                let offset = Self::record_offset(index);
                LittleEndian::write_u32(
                    &mut self.data[offset + NAME_SIZE..offset + RECORD_SIZE],
                    root_page_id,
                );
                true
            }
            None => false,
        }
    }

    /// Remove a record, compacting the tail over it
    pub fn delete_record(&mut self, name: &str) -> bool {
        let count = self.record_count() as usize;
        match self.find_record(name) {
            Some(index) => {
                let from = Self::record_offset(index + 1);
                let to = Self::record_offset(index);
                let end = Self::record_offset(count);
                self.data.copy_within(from..end, to);
                self.set_record_count(count as u32 - 1);
                true
            }
            None => false,
        }
    }

    pub fn get_record(&self, name: &str) -> Option<PageId> {
        self.find_record(name).map(|index| {
            let offset = Self::record_offset(index);
            LittleEndian::read_u32(&self.data[offset + NAME_SIZE..offset + RECORD_SIZE])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut header = HeaderPage::new(&mut data);
        assert_eq!(header.record_count(), 0);

        assert!(header.insert_record("orders_pk", 7));
        assert!(header.insert_record("users_pk", 9));
        assert!(!header.insert_record("orders_pk", 11));

        assert_eq!(header.get_record("orders_pk"), Some(7));
        assert_eq!(header.get_record("users_pk"), Some(9));
        assert_eq!(header.get_record("missing"), None);
    }

    #[test]
    fn test_update_and_delete() {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        let mut header = HeaderPage::new(&mut data);
        assert!(header.insert_record("idx", 3));
        assert!(header.update_record("idx", 12));
        assert_eq!(header.get_record("idx"), Some(12));
        assert!(!header.update_record("nope", 1));

        assert!(header.insert_record("idx2", 5));
        assert!(header.delete_record("idx"));
        assert_eq!(header.get_record("idx"), None);
        assert_eq!(header.get_record("idx2"), Some(5));
        assert_eq!(header.record_count(), 1);
    }
}
