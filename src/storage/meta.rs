//! Metadata page
//!
//! Page 0 describes the tree stored in the rest of the file.
//!
//! ## Format
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ KeyWidth: u32 (4) | PageSize: u32 (4) | Magic: "PGTR" (4)     │
//! │ | Version: u16 (2) | CRC32 of the preceding 14 bytes (4)      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Zero padding up to the page size                              │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The record is bincode-encoded (fixed-width little-endian integers), so
//! the first four bytes of the file are always the key width.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};
use crate::page::METADATA_PAGE_ID;

use super::{Medium, PageStore};

/// Magic bytes identifying a pagetree file
pub(crate) const MAGIC: [u8; 4] = *b"PGTR";

/// Current metadata format version
pub(crate) const VERSION: u16 = 1;

/// Persisted tree metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Key width in bytes; must stay the first field
    pub key_width: u32,
    /// Physical page size the file was created with
    pub page_size: u32,
    magic: [u8; 4],
    version: u16,
}

impl Metadata {
    pub fn new(key_width: u32, page_size: usize) -> Self {
        Self {
            key_width,
            page_size: page_size as u32,
            magic: MAGIC,
            version: VERSION,
        }
    }

    /// Bootstrap an empty store: allocate page 0 and write the record
    pub fn write<M: Medium>(&self, store: &mut PageStore<M>) -> Result<()> {
        if store.page_count() != 0 {
            return Err(TreeError::InvalidArgument(format!(
                "medium already holds {} pages",
                store.page_count()
            )));
        }

        let body =
            bincode::serialize(self).map_err(|e| TreeError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&body);

        if body.len() + 4 > store.page_size() {
            return Err(TreeError::InvalidArgument(format!(
                "{}-byte pages cannot hold the metadata record",
                store.page_size()
            )));
        }

        let mut page = vec![0u8; store.page_size()];
        page[..body.len()].copy_from_slice(&body);
        page[body.len()..body.len() + 4].copy_from_slice(&crc.to_le_bytes());

        let id = store.allocate();
        debug_assert_eq!(id, METADATA_PAGE_ID);
        store.write(id, &page)
    }

    /// Read and validate the record from page 0
    pub fn read<M: Medium>(store: &mut PageStore<M>) -> Result<Self> {
        if store.page_count() == 0 {
            return Err(TreeError::CorruptMetadata(
                "medium has no metadata page".to_string(),
            ));
        }

        let page = store.read(METADATA_PAGE_ID)?;
        let meta: Metadata =
            bincode::deserialize(&page).map_err(|e| TreeError::Serialization(e.to_string()))?;
        let body_len = bincode::serialized_size(&meta)
            .map_err(|e| TreeError::Serialization(e.to_string()))? as usize;

        let stored_crc = u32::from_le_bytes(
            page[body_len..body_len + 4]
                .try_into()
                .map_err(|_| TreeError::CorruptMetadata("truncated checksum".to_string()))?,
        );
        let actual_crc = crc32fast::hash(&page[..body_len]);

        if meta.magic != MAGIC {
            return Err(TreeError::CorruptMetadata(format!(
                "invalid magic: expected PGTR, got {:?}",
                meta.magic
            )));
        }
        if meta.version != VERSION {
            return Err(TreeError::CorruptMetadata(format!(
                "unsupported version: {}",
                meta.version
            )));
        }
        if stored_crc != actual_crc {
            return Err(TreeError::CorruptMetadata(format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, actual_crc
            )));
        }
        if meta.page_size as usize != store.page_size() {
            return Err(TreeError::CorruptMetadata(format!(
                "file uses {}-byte pages, store opened with {}",
                meta.page_size,
                store.page_size()
            )));
        }

        Ok(meta)
    }
}
