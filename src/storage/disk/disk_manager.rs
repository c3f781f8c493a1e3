use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Page, PageId, INVALID_PAGE_ID, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager is responsible for the actual page I/O against the database
/// file. Reads are blocking and idempotent; writes are page-sized.
pub struct DiskManager {
    db_file: Mutex<File>,
    next_page_id: Mutex<PageId>,
}

impl DiskManager {
    /// Create a new DiskManager backed by the given database file
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        let file_size = file.metadata()?.len();
        let next_page_id = (file_size / PAGE_SIZE as u64) as PageId + 1;

        Ok(Self {
            db_file: Mutex::new(file),
            next_page_id: Mutex::new(next_page_id),
        })
    }

    /// Read a page from disk. Reading a page that has never been written
    /// yields a zeroed page.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        if page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = Self::page_offset(page_id);
        let mut buffer = [0u8; PAGE_SIZE];

        {
            let mut file = self.db_file.lock();
            let file_size = file.metadata()?.len();

            // Past the end of the file: the page was allocated but never
            // flushed, hand back zeroes.
            if offset >= file_size {
                page.data.fill(0);
                page.page_id = page_id;
                return Ok(());
            }

            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }

        page.data.copy_from_slice(&buffer);
        page.page_id = page_id;

        Ok(())
    }

    /// Write a page to disk
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        if page.page_id == INVALID_PAGE_ID {
            return Err(DiskManagerError::InvalidPageId(page.page_id));
        }

        let offset = Self::page_offset(page.page_id);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data)?;
        file.flush()?;

        Ok(())
    }

    /// Allocate a new page ID. Allocation is monotonic; first page is 1.
    pub fn allocate_page(&self) -> PageId {
        let mut next = self.next_page_id.lock();
        let page_id = *next;
        *next += 1;
        page_id
    }

    /// Deallocate a page. The file only grows; the id is simply never
    /// handed out again.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    /// Flush and close out the backing file
    pub fn shutdown(&self) -> Result<(), DiskManagerError> {
        let mut file = self.db_file.lock();
        file.flush()?;
        Ok(())
    }

    fn page_offset(page_id: PageId) -> u64 {
        (page_id as u64 - 1) * PAGE_SIZE as u64
    }
}
