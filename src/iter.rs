//! Range Iterator
//!
//! Lazy forward walk over a span of sibling-linked pages.

use std::fs::File;

use crate::error::{Result, TreeError};
use crate::page::{Page, PageId, INVALID_PAGE_ID};
use crate::storage::{Medium, PageCache};

/// Iterator over pages from `min` to `max` following `next_id` links
///
/// Yields `min` first and stops after yielding `max`, or earlier if the
/// sibling chain ends. Not restartable; a read error ends the walk.
pub struct PageIter<'a, M: Medium = File> {
    cache: &'a mut PageCache<M>,
    /// Page to read on the next call
    next_id: Option<PageId>,
    /// Last page of the span
    max_id: PageId,
}

impl<'a, M: Medium> PageIter<'a, M> {
    /// Create an iterator; both bounds are required
    pub fn new(
        cache: &'a mut PageCache<M>,
        min_id: Option<PageId>,
        max_id: Option<PageId>,
    ) -> Result<Self> {
        let (min_id, max_id) = match (min_id, max_id) {
            (Some(min), Some(max)) if min != INVALID_PAGE_ID && max != INVALID_PAGE_ID => {
                (min, max)
            }
            _ => {
                return Err(TreeError::InvalidArgument(
                    "page iterator needs both a min and a max page id".to_string(),
                ))
            }
        };

        Ok(Self {
            cache,
            next_id: Some(min_id),
            max_id,
        })
    }
}

impl<'a, M: Medium> Iterator for PageIter<'a, M> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next_id.take()?;

        let page = match self.cache.read_page(id) {
            Ok(page) => page,
            Err(e) => return Some(Err(e)),
        };

        if page.id != self.max_id && page.next_id != INVALID_PAGE_ID {
            self.next_id = Some(page.next_id);
        }

        Some(Ok(page))
    }
}

impl<'a, M: Medium> std::iter::FusedIterator for PageIter<'a, M> {}
