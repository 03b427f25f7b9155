//! Slotted Page Module
//!
//! One B+Tree node (branch or leaf) per fixed-size page.
//!
//! ## Page Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (24 bytes)                                           │
//! │   Id (4) | Kind (4) | Parent (4) | Prev (4) | Next (4)      │
//! │   | RightPointer (4)                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Directory (grows forward from byte 24)                      │
//! │   [DataOffset: u32][KeyLen: u32][ValueLen: u32]             │
//! │   ... one slot per entry, in key order ...                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Free space (zeroed)                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data region (grows backward from the end of the page)       │
//! │   ... [Key][Value] [Key][Value]                             │
//! │   (first entry closest to the end)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian `u32`. A slot is accepted while the
//! directory cursor after reading it stays below the slot's data offset; the
//! zeroed remainder of the directory therefore terminates decoding. A gap
//! narrower than one slot ends the directory as well.

mod codec;
mod insert;
mod probe;

use bytes::Bytes;

use crate::error::{Result, TreeError};

pub use insert::Split;

// =============================================================================
// Identifiers
// =============================================================================

/// Page identifier; the byte offset of a page is `page_size * id`
pub type PageId = u32;

/// Reserved "none" identifier (also the metadata page)
pub const INVALID_PAGE_ID: PageId = 0;

/// Page holding the tree metadata
pub const METADATA_PAGE_ID: PageId = 0;

/// Conventional root location; the root never moves
pub const ROOT_PAGE_ID: PageId = 1;

// =============================================================================
// Layout Constants (shared by codec, insert, probe)
// =============================================================================

pub(crate) const KIND_OFFSET: usize = 4;
pub(crate) const PARENT_OFFSET: usize = 8;
pub(crate) const PREV_OFFSET: usize = 12;
pub(crate) const NEXT_OFFSET: usize = 16;
pub(crate) const RIGHT_POINTER_OFFSET: usize = 20;

/// Header size: six u32 fields
pub const HEADER_SIZE: usize = RIGHT_POINTER_OFFSET + 4;

/// Directory slot: DataOffset (4) + KeyLen (4) + ValueLen (4)
pub const SLOT_SIZE: usize = 12;

// =============================================================================
// Node Types
// =============================================================================

/// Whether a page routes (branch) or holds data (leaf)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeKind {
    Branch = 0,
    Leaf = 1,
}

impl TryFrom<u32> for NodeKind {
    type Error = u32;

    fn try_from(raw: u32) -> std::result::Result<Self, u32> {
        match raw {
            0 => Ok(NodeKind::Branch),
            1 => Ok(NodeKind::Leaf),
            other => Err(other),
        }
    }
}

/// A key/value pair stored in a page.
/// In a branch the value is the 4-byte id of the child page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Bytes,
    pub value: Bytes,
}

impl Entry {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Branch entry routing keys up to `key` into `child`
    pub fn pointer(key: Bytes, child: PageId) -> Self {
        Self {
            key,
            value: Bytes::copy_from_slice(&child.to_le_bytes()),
        }
    }

    /// Child page id held by a branch entry
    pub fn child_id(&self) -> Option<PageId> {
        let raw: [u8; 4] = self.value.get(..4)?.try_into().ok()?;
        Some(PageId::from_le_bytes(raw))
    }

    /// Bytes this entry occupies in a page: one slot plus its data
    pub fn encoded_len(&self) -> usize {
        SLOT_SIZE + self.key.len() + self.value.len()
    }
}

/// Decoded in-memory form of one tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub kind: NodeKind,
    pub parent_id: PageId,
    pub prev_id: PageId,
    pub next_id: PageId,
    /// Branch only: child for keys above every separator
    pub right_pointer: PageId,
    /// Sorted ascending by key
    pub entries: Vec<Entry>,
}

impl Page {
    /// Empty, unlinked page
    pub fn new(id: PageId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parent_id: INVALID_PAGE_ID,
            prev_id: INVALID_PAGE_ID,
            next_id: INVALID_PAGE_ID,
            right_pointer: INVALID_PAGE_ID,
            entries: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == INVALID_PAGE_ID
    }

    /// Header + one slot per entry + key and value bytes
    pub fn used_bytes(&self) -> usize {
        HEADER_SIZE + self.entries.iter().map(Entry::encoded_len).sum::<usize>()
    }

    pub fn min_key(&self) -> Option<&Bytes> {
        self.entries.first().map(|entry| &entry.key)
    }

    pub fn max_key(&self) -> Option<&Bytes> {
        self.entries.last().map(|entry| &entry.key)
    }

    /// Child ids of a branch in routing order, right pointer last.
    /// Empty for a leaf.
    pub fn children(&self) -> Result<Vec<PageId>> {
        if self.is_leaf() {
            return Ok(Vec::new());
        }
        let mut children = Vec::with_capacity(self.entries.len() + 1);
        for entry in &self.entries {
            let child = entry
                .child_id()
                .ok_or_else(|| TreeError::corrupt(self.id, "branch entry without a child id"))?;
            children.push(child);
        }
        if self.right_pointer != INVALID_PAGE_ID {
            children.push(self.right_pointer);
        }
        Ok(children)
    }

    /// Separator pushed into the parent after this page became a left half
    pub(crate) fn separator(&self) -> Result<Entry> {
        let key = self
            .max_key()
            .cloned()
            .ok_or_else(|| TreeError::corrupt(self.id, "split produced an empty page"))?;
        Ok(Entry::pointer(key, self.id))
    }
}

// =============================================================================
// Split Policy
// =============================================================================

/// Size limits and key width threaded through page mutation
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Physical page size
    pub page_size: usize,
    /// Used-bytes limit above which a page splits
    pub split_threshold: usize,
    /// Declared key width of the tree
    pub key_width: usize,
}

impl Layout {
    /// A page splits above the threshold, and also when it would fill the
    /// physical page completely: the last slot would then end exactly where
    /// the data region starts and read back as the terminating slot.
    pub fn needs_split(&self, page: &Page) -> bool {
        let used = page.used_bytes();
        used > self.split_threshold || used >= self.page_size
    }

    /// Largest single entry (slot included) a page accepts.
    /// With every entry this small, an overfull page always has a cut where
    /// both halves fit the physical page.
    pub fn max_entry_size(&self) -> usize {
        let limit = self.split_threshold.min(self.page_size - 1);
        limit.saturating_sub(HEADER_SIZE) / 2
    }
}
