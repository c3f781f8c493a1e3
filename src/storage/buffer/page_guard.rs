use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::types::{Page, PageId, PagePtr};
use crate::storage::buffer::manager::BufferPoolManager;

/// Pin-only guard over one resident page. Holding it keeps the page in its
/// frame; dropping it releases exactly one pin. Guards move, never clone:
/// overwriting a guard drops the old holding first, which is the whole
/// contract.
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Option<PagePtr>,
    page_id: PageId,
    is_dirty: bool,
}

impl PageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, page: PagePtr) -> Self {
        Self {
            bpm,
            page: Some(page),
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Latch on the dirty bit so the unpin reports the page as modified.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Shared handle to the underlying page; callers latch it themselves.
    pub fn page_ptr(&self) -> &PagePtr {
        self.page.as_ref().expect("page guard already dropped")
    }

    /// Release the pin now. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        if self.page.take().is_some() {
            let _ = self.bpm.unpin_page(self.page_id, self.is_dirty);
            self.is_dirty = false;
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Pin plus shared latch. The pin is managed by the inner guard; the latch
/// is owned here and survives independently of the pool's bookkeeping.
///
/// Field order matters: the pin is released before the latch.
pub struct ReadPageGuard {
    inner: PageGuard,
    latch: Option<ArcRwLockReadGuard<RawRwLock, Page>>,
}

impl ReadPageGuard {
    pub(crate) fn new(inner: PageGuard) -> Self {
        let latch = inner.page_ptr().read_arc();
        Self {
            inner,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn page(&self) -> &Page {
        self.latch.as_ref().expect("page guard already dropped")
    }

    pub fn data(&self) -> &[u8] {
        &self.page().data
    }

    /// Release pin and latch now. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        self.inner.drop_guard();
        self.latch.take();
    }
}

/// Pin plus exclusive latch. Mutable access marks the page dirty so the
/// eventual unpin reports the write.
///
/// Field order matters: the pin is released before the latch.
pub struct WritePageGuard {
    inner: PageGuard,
    latch: Option<ArcRwLockWriteGuard<RawRwLock, Page>>,
}

impl WritePageGuard {
    pub(crate) fn new(inner: PageGuard) -> Self {
        let latch = inner.page_ptr().write_arc();
        Self {
            inner,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn page(&self) -> &Page {
        self.latch.as_ref().expect("page guard already dropped")
    }

    pub fn page_mut(&mut self) -> &mut Page {
        self.inner.mark_dirty();
        self.latch.as_mut().expect("page guard already dropped")
    }

    pub fn data(&self) -> &[u8] {
        &self.page().data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.page_mut().data
    }

    /// Release pin and latch now. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        self.inner.drop_guard();
        self.latch.take();
    }
}
