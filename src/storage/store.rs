//! Page Store
//!
//! Raw fixed-size page allocation and I/O against a backing medium. No
//! caching and no locking: a single caller is assumed.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::MIN_PAGE_SIZE;
use crate::error::{Result, TreeError};
use crate::page::PageId;

/// Byte-addressable backing medium for a page store
pub trait Medium: Read + Write + Seek {
    /// Make written bytes durable
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Medium for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Medium for Cursor<Vec<u8>> {}

/// Fixed-size page I/O over a medium
///
/// Page `id` lives at byte offset `page_size * id`. Ids are handed out
/// monotonically and never reused.
pub struct PageStore<M: Medium = File> {
    medium: M,
    page_size: usize,
    /// Next id `allocate` will return
    next_page_id: PageId,
}

impl PageStore<File> {
    /// Open an existing page file
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::new(file, page_size)
    }

    /// Create (or truncate) a page file
    pub fn create(path: &Path, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Self::new(file, page_size)
    }
}

impl PageStore<Cursor<Vec<u8>>> {
    /// Empty in-memory store
    pub fn in_memory(page_size: usize) -> Result<Self> {
        Self::new(Cursor::new(Vec::new()), page_size)
    }
}

impl<M: Medium> PageStore<M> {
    /// Wrap a medium; numbering resumes after the last whole page it holds
    pub fn new(mut medium: M, page_size: usize) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE {
            return Err(TreeError::InvalidArgument(format!(
                "page size {} is below the minimum of {}",
                page_size, MIN_PAGE_SIZE
            )));
        }
        let len = medium.seek(SeekFrom::End(0))?;
        let next_page_id = (len / page_size as u64) as PageId;
        Ok(Self {
            medium,
            page_size,
            next_page_id,
        })
    }

    /// Hand out the next unused page id
    pub fn allocate(&mut self) -> PageId {
        let id = self.next_page_id;
        self.next_page_id += 1;
        tracing::trace!(page_id = id, "allocated page");
        id
    }

    /// Read one full page; a short read is an I/O error
    pub fn read(&mut self, id: PageId) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.page_size];
        self.medium.seek(SeekFrom::Start(self.offset(id)))?;
        self.medium.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write one page
    ///
    /// Bytes beyond the page size are dropped; a shorter buffer is
    /// zero-padded so the medium stays page-aligned.
    pub fn write(&mut self, id: PageId, data: &[u8]) -> Result<()> {
        let len = data.len().min(self.page_size);
        self.medium.seek(SeekFrom::Start(self.offset(id)))?;
        self.medium.write_all(&data[..len])?;
        if len < self.page_size {
            self.medium.write_all(&vec![0u8; self.page_size - len])?;
        }
        Ok(())
    }

    /// Flush and make written pages durable
    pub fn sync(&mut self) -> Result<()> {
        self.medium.sync()?;
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of ids handed out so far (also the next id to allocate)
    pub fn page_count(&self) -> PageId {
        self.next_page_id
    }

    /// Borrow the underlying medium
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Give back the underlying medium
    pub fn into_medium(self) -> M {
        self.medium
    }

    fn offset(&self, id: PageId) -> u64 {
        self.page_size as u64 * id as u64
    }
}
