use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{FrameId, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::page_guard::{PageGuard, ReadPageGuard, WritePageGuard};
use crate::storage::buffer::replacer::LruKReplacer;
use crate::storage::disk::DiskManager;

/// One slot of the buffer pool. The RwLock inside `page` is the frame's
/// read/write latch; everything else is mutated only under the pool mutex.
struct Frame {
    page: PagePtr,
    pin_count: u32,
    is_dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            page: Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))),
            pin_count: 0,
            is_dirty: false,
        }
    }
}

struct PoolInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruKReplacer,
}

/// Fixed-size buffer pool mapping page ids to frames. All public operations
/// are atomic under one pool mutex; disk I/O happens with only that mutex
/// held, never under a page latch.
pub struct BufferPoolManager {
    pool_size: usize,
    inner: Mutex<PoolInner>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        db_path: impl AsRef<Path>,
        replacer_k: usize,
    ) -> Result<Self, BufferPoolError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        Ok(Self::with_disk_manager(pool_size, replacer_k, disk_manager))
    }

    pub fn with_disk_manager(
        pool_size: usize,
        replacer_k: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            frames.push(Frame::new());
            free_list.push_back(frame_id);
        }
        Self {
            pool_size,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::new(),
                free_list,
                replacer: LruKReplacer::new(pool_size, replacer_k),
            }),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Allocate a brand-new page and pin it into a frame.
    pub fn new_page(&self) -> Result<(PageId, PagePtr), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = self.acquire_frame(&mut inner)?;
        let page_id = self.disk_manager.allocate_page();

        let frame = &mut inner.frames[frame_id];
        {
            let mut page = frame.page.write();
            page.reset();
            page.page_id = page_id;
        }
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page_ptr = frame.page.clone();

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id);
        inner.replacer.set_evictable(frame_id, false);

        Ok((page_id, page_ptr))
    }

    /// Fetch a page, reading it from disk if it is not resident.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "cannot fetch the invalid page id".to_string(),
            ));
        }

        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &mut inner.frames[frame_id];
            frame.pin_count += 1;
            let page_ptr = frame.page.clone();
            inner.replacer.record_access(frame_id);
            inner.replacer.set_evictable(frame_id, false);
            return Ok(page_ptr);
        }

        let frame_id = self.acquire_frame(&mut inner)?;

        // Disk read goes through a scratch page so no latch is held during I/O.
        let mut new_page = Page::new(page_id);
        self.disk_manager.read_page(page_id, &mut new_page)?;

        let frame = &mut inner.frames[frame_id];
        {
            let mut page = frame.page.write();
            *page = new_page;
        }
        frame.pin_count = 1;
        frame.is_dirty = false;
        let page_ptr = frame.page.clone();

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id);
        inner.replacer.set_evictable(frame_id, false);

        Ok(page_ptr)
    }

    /// Drop one pin on a page. The dirty flag only latches on; unpinning
    /// clean never clears a previous dirty mark. When the pin count reaches
    /// zero the frame becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };
        let frame = &mut inner.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }
        frame.pin_count -= 1;
        if is_dirty {
            frame.is_dirty = true;
        }
        if frame.pin_count == 0 {
            inner.replacer.set_evictable(frame_id, true);
        }
        Ok(())
    }

    /// Write a page's bytes back to disk and clear its dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };
        self.flush_frame(&mut inner, frame_id)?;
        Ok(())
    }

    /// Flush every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_ids: Vec<FrameId> = inner.page_table.values().copied().collect();
        for frame_id in frame_ids {
            if inner.frames[frame_id].is_dirty {
                self.flush_frame(&mut inner, frame_id)?;
            }
        }
        Ok(())
    }

    /// Remove a page from the pool and deallocate its id. Succeeds when the
    /// page is not resident; refuses while any pin is outstanding.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();
        let frame_id = match inner.page_table.get(&page_id) {
            Some(&id) => id,
            None => {
                self.disk_manager.deallocate_page(page_id);
                return Ok(());
            }
        };
        if inner.frames[frame_id].pin_count > 0 {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        inner.page_table.remove(&page_id);
        inner.replacer.remove(frame_id);
        let frame = &mut inner.frames[frame_id];
        {
            let mut page = frame.page.write();
            page.reset();
        }
        frame.is_dirty = false;
        inner.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);
        Ok(())
    }

    /// Current pin count of a resident page (None when not resident).
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| inner.frames[frame_id].pin_count)
    }

    pub fn disk_manager(&self) -> Arc<DiskManager> {
        self.disk_manager.clone()
    }

    /// Allocate a new page and wrap it in a pin-only guard.
    pub fn new_page_guarded(self: &Arc<Self>) -> Result<PageGuard, BufferPoolError> {
        let (page_id, page) = self.new_page()?;
        Ok(PageGuard::new(self.clone(), page_id, page))
    }

    /// Fetch a page under a pin-only guard.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Result<PageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        Ok(PageGuard::new(self.clone(), page_id, page))
    }

    /// Fetch a page, pin it, and take its shared latch.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Result<ReadPageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        Ok(ReadPageGuard::new(PageGuard::new(self.clone(), page_id, page)))
    }

    /// Fetch a page, pin it, and take its exclusive latch.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Result<WritePageGuard, BufferPoolError> {
        let page = self.fetch_page(page_id)?;
        Ok(WritePageGuard::new(PageGuard::new(self.clone(), page_id, page)))
    }

    /// Allocate a new page and take its exclusive latch straight away.
    pub fn new_page_write(self: &Arc<Self>) -> Result<WritePageGuard, BufferPoolError> {
        let (page_id, page) = self.new_page()?;
        Ok(WritePageGuard::new(PageGuard::new(self.clone(), page_id, page)))
    }

    /// Find a usable frame: the free list first, then the replacer. The
    /// victim's dirty contents are flushed and its page-table entry erased.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }
        let frame_id = inner.replacer.evict().ok_or(BufferPoolError::BufferPoolFull)?;
        let victim_page_id = {
            let frame = &inner.frames[frame_id];
            assert_eq!(frame.pin_count, 0, "evicted a pinned frame");
            frame.page.read().page_id
        };
        debug!("evicting page {} from frame {}", victim_page_id, frame_id);
        if inner.frames[frame_id].is_dirty {
            self.flush_frame(inner, frame_id)?;
        }
        if victim_page_id != INVALID_PAGE_ID {
            inner.page_table.remove(&victim_page_id);
        }
        Ok(frame_id)
    }

    fn flush_frame(&self, inner: &mut PoolInner, frame_id: FrameId) -> Result<(), BufferPoolError> {
        // Copy out under a short read latch so the disk write itself runs
        // without any page latch held.
        let page_copy = inner.frames[frame_id].page.read().clone();
        self.disk_manager.write_page(&page_copy)?;
        inner.frames[frame_id].is_dirty = false;
        Ok(())
    }
}
