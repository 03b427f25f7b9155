//! Page insertion and splitting
//!
//! Splits keep the identity of the page being split: the original page
//! becomes the right half and keeps its id, a freshly allocated page becomes
//! the left half. Only the left half has to be announced to the parent, so
//! nothing that already points at the original page needs rewriting.

use std::mem;

use bytes::Bytes;

use crate::error::{Result, TreeError};
use crate::key::{self, KeyOrdering};
use crate::storage::{Medium, PageCache};

use super::{Entry, Layout, NodeKind, Page, PageId, HEADER_SIZE, INVALID_PAGE_ID};

/// What a split left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    /// The root split in place: it is now a branch over `left` and `right`
    Root { left: PageId, right: PageId },
    /// `separator` must be inserted into `parent`
    Promote { parent: PageId, separator: Entry },
}

impl Page {
    /// Insert an entry into this page and split upward as far as needed
    ///
    /// Every touched page is written back through the cache.
    pub fn insert<M: Medium>(
        self,
        cache: &mut PageCache<M>,
        layout: &Layout,
        key: Bytes,
        value: Bytes,
    ) -> Result<()> {
        let mut page = self;
        let mut entry = Entry { key, value };

        loop {
            page.place(entry, layout.key_width)?;

            if !layout.needs_split(&page) {
                return cache.write_page(&page);
            }

            match page.split(cache)? {
                Split::Root { .. } => return Ok(()),
                Split::Promote { parent, separator } => {
                    page = cache.read_page(parent)?;
                    entry = separator;
                }
            }
        }
    }

    /// Put `entry` before the first entry with a greater key
    fn place(&mut self, entry: Entry, key_width: usize) -> Result<()> {
        let mut position = self.entries.len();
        for (i, existing) in self.entries.iter().enumerate() {
            match key::compare(&existing.key, &entry.key, key_width) {
                KeyOrdering::Greater => {
                    position = i;
                    break;
                }
                KeyOrdering::Equal if self.is_leaf() => return Err(TreeError::DuplicateKey),
                KeyOrdering::Indeterminate => {
                    return Err(TreeError::InvalidKey {
                        expected: key_width,
                        actual: entry.key.len(),
                    })
                }
                _ => {}
            }
        }
        self.entries.insert(position, entry);
        Ok(())
    }

    /// Split this page into a new left half and itself as the right half
    ///
    /// Both halves are checked against the page size before anything is
    /// allocated or written, so a split either lands whole or fails with
    /// `PageOverflow` and leaves the tree untouched.
    pub fn split<M: Medium>(&mut self, cache: &mut PageCache<M>) -> Result<Split> {
        let split_at = self.split_point(cache.page_size())?;
        let left_id = cache.create_page()?.page_id();

        let upper = self.entries.split_off(split_at);
        let lower = mem::replace(&mut self.entries, upper);

        let mut left = Page {
            id: left_id,
            kind: self.kind,
            parent_id: self.parent_id,
            prev_id: self.prev_id,
            next_id: self.id,
            right_pointer: INVALID_PAGE_ID,
            entries: lower,
        };
        self.prev_id = left_id;

        tracing::debug!(
            page_id = self.id,
            left_id,
            left_entries = left.entries.len(),
            right_entries = self.entries.len(),
            root = self.is_root(),
            "splitting page"
        );

        if left.prev_id != INVALID_PAGE_ID {
            let mut prev = cache.read_page(left.prev_id)?;
            prev.next_id = left_id;
            cache.write_page(&prev)?;
        }

        left.relink_children(cache)?;

        if self.is_root() {
            return self.split_root(cache, left);
        }

        let separator = left.separator()?;
        cache.write_page(self)?;
        cache.write_page(&left)?;
        Ok(Split::Promote {
            parent: self.parent_id,
            separator,
        })
    }

    /// Index of the first entry that stays in the right half
    ///
    /// The count-based cut `count/2 + 1` (left-biased, never empty on either
    /// side) is kept when both halves fit the page. Otherwise the nearest cut
    /// that fits wins.
    fn split_point(&self, page_size: usize) -> Result<usize> {
        let count = self.entries.len();
        if count < 2 {
            return Err(TreeError::corrupt(self.id, "cannot split fewer than two entries"));
        }

        // prefix[i]: bytes of the first i entries
        let mut prefix = Vec::with_capacity(count + 1);
        let mut running = 0usize;
        prefix.push(running);
        for entry in &self.entries {
            running += entry.encoded_len();
            prefix.push(running);
        }
        let total = prefix[count];
        let fits = |cut: usize| {
            HEADER_SIZE + prefix[cut] < page_size && HEADER_SIZE + total - prefix[cut] < page_size
        };

        let preferred = (count / 2 + 1).min(count - 1);
        if fits(preferred) {
            return Ok(preferred);
        }
        (1..count)
            .filter(|&cut| fits(cut))
            .min_by_key(|&cut| cut.abs_diff(preferred))
            .ok_or(TreeError::PageOverflow {
                page_id: self.id,
                used: self.used_bytes(),
                capacity: page_size,
            })
    }

    /// Turn this root into a branch over `left` and a new right page that
    /// takes over the remaining entries
    fn split_root<M: Medium>(&mut self, cache: &mut PageCache<M>, mut left: Page) -> Result<Split> {
        let right_id = cache.create_page()?.page_id();
        let right = Page {
            id: right_id,
            kind: self.kind,
            parent_id: self.id,
            prev_id: left.id,
            next_id: INVALID_PAGE_ID,
            right_pointer: self.right_pointer,
            entries: mem::take(&mut self.entries),
        };

        left.parent_id = self.id;
        left.next_id = right_id;

        self.kind = NodeKind::Branch;
        self.prev_id = INVALID_PAGE_ID;
        self.next_id = INVALID_PAGE_ID;
        self.right_pointer = right_id;
        self.entries = vec![left.separator()?];

        cache.write_page(&left)?;
        cache.write_page(&right)?;
        right.relink_children(cache)?;
        cache.write_page(self)?;

        tracing::debug!(root_id = self.id, left_id = left.id, right_id, "root split");
        Ok(Split::Root {
            left: left.id,
            right: right_id,
        })
    }

    /// Point every child of this branch back at it; no-op for leaves
    pub fn relink_children<M: Medium>(&self, cache: &mut PageCache<M>) -> Result<()> {
        for child_id in self.children()? {
            let mut child = cache.read_page(child_id)?;
            child.parent_id = self.id;
            cache.write_page(&child)?;
        }
        Ok(())
    }
}
