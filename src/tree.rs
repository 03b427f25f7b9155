//! B+Tree Module
//!
//! The disk-resident index that coordinates pages, cache and metadata.
//!
//! ## Responsibilities
//! - Track the root (always page 1 once the tree holds anything)
//! - Route inserts to the owning leaf and let pages split upward
//! - Answer point lookups and range queries
//! - Recover key width and root presence from the file on open

use std::cmp::Ordering;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{Result, TreeError};
use crate::iter::PageIter;
use crate::key::{self, KeyOrdering};
use crate::page::{
    Entry, Layout, NodeKind, Page, PageId, HEADER_SIZE, INVALID_PAGE_ID, ROOT_PAGE_ID, SLOT_SIZE,
};
use crate::storage::{Medium, Metadata, PageCache, PageStore};

/// Shape summary of a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Depth of the deepest page; a lone root leaf has depth 0
    pub depth: usize,
    pub branch_pages: usize,
    pub leaf_pages: usize,
    /// Entries stored in leaves
    pub entries: usize,
}

/// B+Tree over ordered fixed-width keys
///
/// ## Concurrency:
/// None. One handle owns the cache and the file; callers that share a tree
/// across threads must serialize access themselves.
pub struct BPlusTree<M: Medium = File> {
    /// Page cache (owns the page store)
    cache: PageCache<M>,

    /// `None` while only the metadata page exists
    root_id: Option<PageId>,

    /// Declared key width in bytes
    key_width: u32,

    /// Split policy handed to page mutation
    layout: Layout,
}

impl BPlusTree<File> {
    /// Create a new tree file at `path`, truncating any existing one
    pub fn create_file(path: &Path, config: &Config) -> Result<Self> {
        config.validate()?;
        let store = PageStore::create(path, config.page_size)?;
        Self::create(PageCache::new(store, config.pool_capacity)?, config)
    }

    /// Open an existing tree file
    pub fn open_file(path: &Path, config: &Config) -> Result<Self> {
        config.validate()?;
        let store = PageStore::open(path, config.page_size)?;
        Self::open(PageCache::new(store, config.pool_capacity)?, config)
    }
}

impl BPlusTree<Cursor<Vec<u8>>> {
    /// New tree backed by memory only
    pub fn in_memory(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = PageStore::in_memory(config.page_size)?;
        Self::create(PageCache::new(store, config.pool_capacity)?, config)
    }
}

impl<M: Medium> BPlusTree<M> {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize an empty medium with metadata and return an empty tree
    pub fn create(mut cache: PageCache<M>, config: &Config) -> Result<Self> {
        config.validate()?;
        Metadata::new(config.key_width, cache.page_size()).write(cache.store_mut())?;

        tracing::info!(
            key_width = config.key_width,
            page_size = cache.page_size(),
            split_threshold = config.split_threshold,
            "created tree"
        );
        Self::assemble(cache, config.key_width, config.split_threshold, None)
    }

    /// Recover a tree from a medium initialized by `create`
    ///
    /// The root is present iff the medium holds more than the metadata page.
    pub fn open(mut cache: PageCache<M>, config: &Config) -> Result<Self> {
        config.validate()?;
        let meta = Metadata::read(cache.store_mut()).map_err(|e| {
            tracing::warn!(error = %e, "rejected metadata page");
            e
        })?;
        let root_id = (cache.store().page_count() > ROOT_PAGE_ID).then_some(ROOT_PAGE_ID);

        tracing::info!(
            key_width = meta.key_width,
            page_size = cache.page_size(),
            pages = cache.store().page_count(),
            has_root = root_id.is_some(),
            "opened tree"
        );
        Self::assemble(cache, meta.key_width, config.split_threshold, root_id)
    }

    fn assemble(
        cache: PageCache<M>,
        key_width: u32,
        split_threshold: usize,
        root_id: Option<PageId>,
    ) -> Result<Self> {
        let width = key_width as usize;
        if width == 0 || width % key::COLUMN_SIZE != 0 {
            return Err(TreeError::CorruptMetadata(format!(
                "key width {} is not a positive multiple of {}",
                key_width,
                key::COLUMN_SIZE
            )));
        }
        if split_threshold > cache.page_size() {
            return Err(TreeError::InvalidArgument(format!(
                "split threshold {} exceeds the page size {}",
                split_threshold,
                cache.page_size()
            )));
        }

        let layout = Layout {
            page_size: cache.page_size(),
            split_threshold,
            key_width: width,
        };

        // Separators must fit, or branches could never split
        let separator_size = SLOT_SIZE + width + std::mem::size_of::<PageId>();
        if separator_size > layout.max_entry_size() {
            return Err(TreeError::InvalidArgument(format!(
                "{}-byte keys leave no room for two separators in {} bytes after the {}-byte header",
                width, split_threshold, HEADER_SIZE
            )));
        }

        Ok(Self {
            cache,
            root_id,
            key_width,
            layout,
        })
    }

    /// Write every dirty page back to the file; returns how many were written
    pub fn flush(&mut self) -> Result<usize> {
        self.cache.flush_all()
    }

    /// Flush and sync, then drop the handle
    pub fn close(mut self) -> Result<()> {
        self.cache.flush_all()?;
        self.cache.store_mut().sync()
    }

    /// Flush and hand back the page store (e.g. to reopen an in-memory tree)
    pub fn into_store(self) -> Result<PageStore<M>> {
        self.cache.into_store()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a key/value pair
    ///
    /// The key must be exactly `key_width` bytes; equal keys are rejected.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;

        let size = SLOT_SIZE + key.len() + value.len();
        let max = self.layout.max_entry_size();
        if size > max {
            return Err(TreeError::EntryTooLarge { size, max });
        }

        let root_id = match self.root_id {
            Some(id) => id,
            None => self.create_root()?,
        };

        let width = self.width();
        let root = self.cache.read_page(root_id)?;
        let leaf = root
            .range_probe(&mut self.cache, key, key, width)?
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::NotFound("no leaf owns the key".to_string()))?;

        leaf.insert(
            &mut self.cache,
            &self.layout,
            Bytes::copy_from_slice(key),
            Bytes::copy_from_slice(value),
        )
    }

    fn create_root(&mut self) -> Result<PageId> {
        let id = self.cache.create_page()?.page_id();
        if id != ROOT_PAGE_ID {
            return Err(TreeError::corrupt(
                id,
                format!("root must be allocated at page {}", ROOT_PAGE_ID),
            ));
        }
        self.cache.write_page(&Page::new(id, NodeKind::Leaf))?;
        self.root_id = Some(id);
        tracing::debug!(root_id = id, "created root leaf");
        Ok(id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value stored under `key`, if any
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_key(key)?;
        let width = self.width();

        let Some(leaf) = self.range_scan(key, key)?.into_iter().next() else {
            return Ok(None);
        };
        Ok(leaf
            .entries
            .into_iter()
            .find(|entry| key::compare(&entry.key, key, width) == KeyOrdering::Equal)
            .map(|entry| entry.value))
    }

    /// Leaves covering `[min, max]` in ascending order
    pub fn range_scan(&mut self, min: &[u8], max: &[u8]) -> Result<Vec<Page>> {
        self.check_bound(min)?;
        self.check_bound(max)?;

        let Some(root_id) = self.root_id else {
            return Ok(Vec::new());
        };
        let width = self.width();
        let root = self.cache.read_page(root_id)?;
        root.range_probe(&mut self.cache, min, max, width)
    }

    /// Entries with `min <= key <= max`, in key order
    pub fn scan(&mut self, min: &[u8], max: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let width = self.width();
        let pages = self.range_scan(min, max)?;
        Ok(pages
            .into_iter()
            .flat_map(|page| page.entries)
            .filter(|entry| {
                key::compare(&entry.key, min, width) != KeyOrdering::Less
                    && key::compare(&entry.key, max, width) != KeyOrdering::Greater
            })
            .map(|Entry { key, value }| (key, value))
            .collect())
    }

    /// First and last leaf a key range touches, for `pages`
    pub fn leaf_bounds(&mut self, min: &[u8], max: &[u8]) -> Result<Option<(PageId, PageId)>> {
        let pages = self.range_scan(min, max)?;
        Ok(pages.first().zip(pages.last()).map(|(first, last)| (first.id, last.id)))
    }

    /// Lazy walk over the sibling chain from `min_page` to `max_page`
    pub fn pages(
        &mut self,
        min_page: Option<PageId>,
        max_page: Option<PageId>,
    ) -> Result<PageIter<'_, M>> {
        PageIter::new(&mut self.cache, min_page, max_page)
    }

    /// Every page, pre-order: a branch, then its children in routing order
    /// with the right pointer last
    pub fn all(&mut self) -> Result<Vec<Page>> {
        Ok(self.walk()?.into_iter().map(|(_, page)| page).collect())
    }

    /// Pre-order walk with the depth of each page (root = 0)
    fn walk(&mut self) -> Result<Vec<(usize, Page)>> {
        let Some(root_id) = self.root_id else {
            return Ok(Vec::new());
        };

        let mut pages = Vec::new();
        let mut stack = vec![(0, root_id)];
        while let Some((depth, id)) = stack.pop() {
            let page = self.cache.read_page(id)?;
            for child in page.children()?.into_iter().rev() {
                stack.push((depth + 1, child));
            }
            pages.push((depth, page));
        }
        Ok(pages)
    }

    /// Depth, page counts and entry count
    pub fn stats(&mut self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        for (depth, page) in self.walk()? {
            stats.depth = stats.depth.max(depth);
            if page.is_leaf() {
                stats.leaf_pages += 1;
                stats.entries += page.entries.len();
            } else {
                stats.branch_pages += 1;
            }
        }
        Ok(stats)
    }

    /// Verify structural invariants
    ///
    /// Entries strictly ascending in every page, every child pointing back at
    /// its parent, and a leaf chain that visits the leaves in tree order with
    /// consistent back-links and globally ascending keys.
    pub fn check(&mut self) -> Result<()> {
        let width = self.width();
        let walked = self.walk()?;

        for (_, page) in &walked {
            for pair in page.entries.windows(2) {
                if key::compare(&pair[0].key, &pair[1].key, width) != KeyOrdering::Less {
                    return Err(TreeError::corrupt(page.id, "entries out of order"));
                }
            }
            for child_id in page.children()? {
                let child = self.cache.read_page(child_id)?;
                if child.parent_id != page.id {
                    return Err(TreeError::corrupt(
                        child_id,
                        format!("parent is {} but page {} points at it", child.parent_id, page.id),
                    ));
                }
            }
        }

        let leaves: Vec<PageId> = walked
            .iter()
            .filter(|(_, page)| page.is_leaf())
            .map(|(_, page)| page.id)
            .collect();

        let mut chain = Vec::with_capacity(leaves.len());
        let mut prev_id = INVALID_PAGE_ID;
        let mut next_id = leaves.first().copied().unwrap_or(INVALID_PAGE_ID);
        let mut last_key: Option<Bytes> = None;
        while next_id != INVALID_PAGE_ID {
            if chain.len() == leaves.len() {
                return Err(TreeError::corrupt(next_id, "leaf chain is longer than the tree"));
            }
            let leaf = self.cache.read_page(next_id)?;
            if leaf.prev_id != prev_id {
                return Err(TreeError::corrupt(
                    leaf.id,
                    format!("prev link is {}, expected {}", leaf.prev_id, prev_id),
                ));
            }
            for entry in &leaf.entries {
                if let Some(last) = &last_key {
                    if key::compare(last, &entry.key, width).as_ordering() != Some(Ordering::Less) {
                        return Err(TreeError::corrupt(leaf.id, "leaf chain keys not ascending"));
                    }
                }
                last_key = Some(entry.key.clone());
            }
            chain.push(leaf.id);
            prev_id = leaf.id;
            next_id = leaf.next_id;
        }

        if chain != leaves {
            return Err(TreeError::corrupt(
                self.root_id.unwrap_or(INVALID_PAGE_ID),
                "leaf chain disagrees with tree order",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn key_width(&self) -> u32 {
        self.key_width
    }

    pub fn root_id(&self) -> Option<PageId> {
        self.root_id
    }

    pub fn is_empty(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn cache(&self) -> &PageCache<M> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PageCache<M> {
        &mut self.cache
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn width(&self) -> usize {
        self.key_width as usize
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.width() {
            return Err(TreeError::InvalidKey {
                expected: self.width(),
                actual: key.len(),
            });
        }
        Ok(())
    }

    /// Range bounds only need to cover the key width
    fn check_bound(&self, bound: &[u8]) -> Result<()> {
        if key::compare(bound, bound, self.width()) == KeyOrdering::Indeterminate {
            return Err(TreeError::InvalidKey {
                expected: self.width(),
                actual: bound.len(),
            });
        }
        Ok(())
    }
}
