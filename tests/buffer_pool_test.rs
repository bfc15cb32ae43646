use anyhow::Result;

mod common;
use common::create_test_buffer_pool;

#[test]
fn test_new_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;

    // page ids start after the reserved header page
    assert!(page_id > 0);
    {
        let page_guard = page.read();
        assert_eq!(page_guard.page_id, page_id);
    }

    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_fetch_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    let fetched_page = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched_page.read();
        assert_eq!(page_guard.page_id, page_id);
    }
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_page_modification_survives_eviction() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(3)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        let test_data = b"Test Data";
        page_guard.data[100..100 + test_data.len()].copy_from_slice(test_data);
    }
    buffer_pool.unpin_page(page_id, true)?;

    // Push the page out of the pool; the dirty frame must be flushed
    for offset in 1..=3u32 {
        let fill_id = page_id + offset;
        let _ = buffer_pool.fetch_page(fill_id)?;
        buffer_pool.unpin_page(fill_id, false)?;
    }
    assert!(!buffer_pool.contains(page_id));

    let fetched_page = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched_page.read();
        assert_eq!(&page_guard.data[100..109], b"Test Data");
    }
    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_lru_victim_is_least_recently_unpinned() -> Result<()> {
    // Pool of 3: fetch pages 1,2,3, unpin them all, then fetch page 4.
    // The replacer must victimise page 1.
    let (buffer_pool, _temp_file) = create_test_buffer_pool(3)?;

    for page_id in 1..=3u32 {
        let _ = buffer_pool.fetch_page(page_id)?;
    }
    for page_id in 1..=3u32 {
        buffer_pool.unpin_page(page_id, false)?;
    }

    let _ = buffer_pool.fetch_page(4)?;
    assert!(!buffer_pool.contains(1));
    assert!(buffer_pool.contains(2));
    assert!(buffer_pool.contains(3));
    assert!(buffer_pool.contains(4));
    buffer_pool.unpin_page(4, false)?;
    Ok(())
}

#[test]
fn test_pinned_pages_are_not_evicted() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(1)?;

    let _page = buffer_pool.fetch_page(1)?;
    // every frame pinned: no page can come in
    assert!(buffer_pool.fetch_page(2).is_err());

    buffer_pool.unpin_page(1, false)?;
    let _ = buffer_pool.fetch_page(2)?;
    assert!(buffer_pool.contains(2));
    buffer_pool.unpin_page(2, false)?;
    Ok(())
}

#[test]
fn test_unpin_validations() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(4)?;

    // not resident at all
    assert!(buffer_pool.unpin_page(42, false).is_err());

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;
    // second unpin: the pin count is already zero
    assert!(buffer_pool.unpin_page(page_id, false).is_err());
    Ok(())
}

#[test]
fn test_flush_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(4)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        let test_data = b"Flush Me";
        page_guard.data[0..test_data.len()].copy_from_slice(test_data);
    }
    buffer_pool.unpin_page(page_id, true)?;
    buffer_pool.flush_page(page_id)?;

    assert!(buffer_pool.flush_page(999).is_err());
    Ok(())
}

#[test]
fn test_flush_all_pages() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(8)?;

    let mut page_ids = Vec::new();
    for i in 0..5u8 {
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut page_guard = page.write();
            page_guard.data[0] = i;
        }
        buffer_pool.unpin_page(page_id, true)?;
        page_ids.push(page_id);
    }

    buffer_pool.flush_all_pages()?;

    for (i, &page_id) in page_ids.iter().enumerate() {
        let page = buffer_pool.fetch_page(page_id)?;
        {
            let page_guard = page.read();
            assert_eq!(page_guard.data[0], i as u8);
        }
        buffer_pool.unpin_page(page_id, false)?;
    }
    Ok(())
}

#[test]
fn test_delete_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(4)?;

    let (_, page_id) = buffer_pool.new_page()?;

    // pinned pages cannot be deleted
    assert!(buffer_pool.delete_page(page_id).is_err());

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.delete_page(page_id)?;
    assert!(!buffer_pool.contains(page_id));

    // deleting a page that is not resident still succeeds (disk-side only)
    buffer_pool.delete_page(77)?;
    Ok(())
}

#[test]
fn test_deleted_page_id_is_recycled() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(4)?;

    let (_, first_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(first_id, false)?;
    buffer_pool.delete_page(first_id)?;

    let (_, second_id) = buffer_pool.new_page()?;
    assert_eq!(second_id, first_id);
    buffer_pool.unpin_page(second_id, false)?;
    Ok(())
}
