//! Page Cache
//!
//! Bounded pool of page frames in front of a `PageStore`.
//!
//! ## Responsibilities
//! - Serve pages from memory, reading through on a miss
//! - Evict the least recently used frame when the pool is full
//! - Write dirty frames back on eviction and on `flush_all`
//!
//! ## Write Discipline
//! Every page mutation goes through the cache: `write_page` encodes into the
//! frame and marks it dirty. Eviction and `flush_all` are the only paths
//! that write to the store.

use std::collections::HashMap;
use std::fs::File;

use crate::error::{Result, TreeError};
use crate::page::{Page, PageId};

use super::{Medium, PageStore};

/// Index of a frame inside the pool
pub type FrameId = usize;

/// One cached page plus bookkeeping
#[derive(Debug)]
pub struct Frame {
    page_id: PageId,
    data: Vec<u8>,
    dirty: bool,
    /// Logical clock value of the last access
    last_access: u64,
}

impl Frame {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable page bytes; marks the frame dirty
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_access(&self) -> u64 {
        self.last_access
    }
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

/// LRU page cache over a page store
///
/// The page table is the single source of truth for "is this page cached";
/// every frame in `frames` has exactly one entry in it.
pub struct PageCache<M: Medium = File> {
    store: PageStore<M>,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    capacity: usize,
    clock: u64,
    stats: CacheStats,
}

impl<M: Medium> PageCache<M> {
    /// Create a cache holding at most `capacity` pages
    pub fn new(store: PageStore<M>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TreeError::InvalidArgument(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            frames: Vec::with_capacity(capacity),
            page_table: HashMap::with_capacity(capacity),
            capacity,
            clock: 0,
            stats: CacheStats::default(),
        })
    }

    // =========================================================================
    // Frame Access
    // =========================================================================

    /// Get the frame holding page `id`, reading it from the store on a miss
    pub fn fetch(&mut self, id: PageId) -> Result<&mut Frame> {
        if let Some(&frame_id) = self.page_table.get(&id) {
            let stamp = self.tick();
            self.stats.hits += 1;
            tracing::trace!(page_id = id, frame_id, "cache hit");
            let frame = &mut self.frames[frame_id];
            frame.last_access = stamp;
            return Ok(frame);
        }

        self.stats.misses += 1;
        tracing::trace!(page_id = id, "cache miss");
        let data = self.store.read(id)?;
        let frame_id = self.register_frame(id, data, false)?;
        Ok(&mut self.frames[frame_id])
    }

    /// Allocate a fresh page and give it a frame without touching the disk
    ///
    /// The frame starts zeroed and dirty, so the page reaches the store even
    /// if the caller never writes it.
    pub fn create_page(&mut self) -> Result<&mut Frame> {
        let id = self.store.allocate();
        let data = vec![0u8; self.store.page_size()];
        let frame_id = self.register_frame(id, data, true)?;
        tracing::debug!(page_id = id, frame_id, "created page");
        Ok(&mut self.frames[frame_id])
    }

    /// Write every dirty frame back to the store; returns how many were written
    pub fn flush_all(&mut self) -> Result<usize> {
        let mut written = 0;
        for frame in self.frames.iter_mut().filter(|frame| frame.dirty) {
            self.store.write(frame.page_id, &frame.data)?;
            frame.dirty = false;
            written += 1;
        }
        self.stats.write_backs += written as u64;
        if written > 0 {
            tracing::debug!(pages = written, "flushed dirty pages");
        }
        Ok(written)
    }

    // =========================================================================
    // Decoded Page Access
    // =========================================================================

    /// Decode page `id` from its frame
    pub fn read_page(&mut self, id: PageId) -> Result<Page> {
        let frame = self.fetch(id)?;
        let page = Page::decode(frame.data())?;
        if page.id != id {
            return Err(TreeError::corrupt(
                id,
                format!("header carries id {}", page.id),
            ));
        }
        Ok(page)
    }

    /// Encode `page` into its frame and mark it dirty
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        let frame = self.fetch(page.id)?;
        page.encode_into(frame.data_mut())
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Frame that the next miss would recycle, or `None` while there is room
    ///
    /// Linear scan for the oldest access stamp; pools are small.
    pub fn victim(&self) -> Option<FrameId> {
        if self.has_room() {
            return None;
        }
        self.frames
            .iter()
            .enumerate()
            .min_by_key(|(_, frame)| frame.last_access)
            .map(|(frame_id, _)| frame_id)
    }

    /// Place a page into a frame and link it into the page table.
    ///
    /// Both the miss path of `fetch` and `create_page` go through here, so no
    /// caller ever receives a frame the page table does not know about.
    fn register_frame(&mut self, page_id: PageId, data: Vec<u8>, dirty: bool) -> Result<FrameId> {
        let frame = Frame {
            page_id,
            data,
            dirty,
            last_access: self.tick(),
        };

        let frame_id = if self.has_room() {
            self.frames.push(frame);
            self.frames.len() - 1
        } else {
            let victim = self.victim().ok_or_else(|| {
                TreeError::Eviction(format!(
                    "pool of {} frames is full but has no victim",
                    self.capacity
                ))
            })?;
            self.evict(victim)?;
            self.frames[victim] = frame;
            victim
        };

        self.page_table.insert(page_id, frame_id);
        Ok(frame_id)
    }

    /// Write back a dirty frame and unlink it from the page table
    fn evict(&mut self, frame_id: FrameId) -> Result<()> {
        let frame = &mut self.frames[frame_id];
        let page_id = frame.page_id;
        let dirty = frame.dirty;
        if dirty {
            self.store.write(page_id, &frame.data)?;
            frame.dirty = false;
            self.stats.write_backs += 1;
        }
        self.page_table.remove(&page_id);
        self.stats.evictions += 1;
        tracing::debug!(page_id, frame_id, dirty, "evicted page");
        Ok(())
    }

    fn has_room(&self) -> bool {
        self.frames.len() < self.capacity
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Frame currently holding page `id`
    pub fn frame_of(&self, id: PageId) -> Option<FrameId> {
        self.page_table.get(&id).copied()
    }

    pub fn is_cached(&self, id: PageId) -> bool {
        self.page_table.contains_key(&id)
    }

    pub fn frame(&self, frame_id: FrameId) -> Option<&Frame> {
        self.frames.get(frame_id)
    }

    /// Number of occupied frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn store(&self) -> &PageStore<M> {
        &self.store
    }

    /// Direct store access; bypasses the cache, so only for pages the cache
    /// never holds (the metadata page)
    pub fn store_mut(&mut self) -> &mut PageStore<M> {
        &mut self.store
    }

    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Flush every dirty frame and give back the store
    pub fn into_store(mut self) -> Result<PageStore<M>> {
        self.flush_all()?;
        Ok(self.store)
    }
}
