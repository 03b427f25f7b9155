//! Range probe
//!
//! Descends from a page to the first leaf that can hold `min`, then walks the
//! leaf sibling chain until a leaf reaches `max` or the chain ends.

use crate::error::{Result, TreeError};
use crate::key::{self, KeyOrdering};
use crate::storage::{Medium, PageCache};

use super::{Page, PageId, INVALID_PAGE_ID};

impl Page {
    /// Leaves covering `[min, max]` in ascending order
    ///
    /// Assumes `min <= max` and keys of the tree's width.
    pub fn range_probe<M: Medium>(
        &self,
        cache: &mut PageCache<M>,
        min: &[u8],
        max: &[u8],
        key_width: usize,
    ) -> Result<Vec<Page>> {
        let mut current = self.clone();
        while !current.is_leaf() {
            let child = current.route(min, key_width)?;
            current = cache.read_page(child)?;
        }

        let mut pages = Vec::new();
        loop {
            let reached_max = current
                .entries
                .iter()
                .any(|entry| key::compare(&entry.key, max, key_width) != KeyOrdering::Less);
            let next_id = current.next_id;
            pages.push(current);

            if reached_max || next_id == INVALID_PAGE_ID {
                return Ok(pages);
            }
            current = cache.read_page(next_id)?;
        }
    }

    /// Child of this branch that covers `target`: the first separator not
    /// below it, else the right pointer
    pub fn route(&self, target: &[u8], key_width: usize) -> Result<PageId> {
        let child = match self
            .entries
            .iter()
            .find(|entry| key::compare(&entry.key, target, key_width) != KeyOrdering::Less)
        {
            Some(entry) => entry
                .child_id()
                .ok_or_else(|| TreeError::corrupt(self.id, "branch entry without a child id"))?,
            None => self.right_pointer,
        };

        if child == INVALID_PAGE_ID {
            return Err(TreeError::NotFound(format!(
                "branch {} has no child for the probed key",
                self.id
            )));
        }
        Ok(child)
    }
}
