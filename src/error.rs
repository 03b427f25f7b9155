//! Error types for pagetree
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::page::PageId;

/// Result type alias using TreeError
pub type Result<T> = std::result::Result<T, TreeError>;

/// Unified error type for pagetree operations
#[derive(Debug, Error)]
pub enum TreeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Corrupt metadata page: {0}")]
    CorruptMetadata(String),

    #[error("Page {page_id} overflow: {used} bytes used, capacity {capacity}")]
    PageOverflow {
        page_id: PageId,
        used: usize,
        capacity: usize,
    },

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Eviction failed: {0}")]
    Eviction(String),

    // -------------------------------------------------------------------------
    // Tree Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid key: expected width {expected}, got {actual} bytes")]
    InvalidKey { expected: usize, actual: usize },

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Entry too large: {size} bytes (max {max})")]
    EntryTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Argument / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl TreeError {
    pub(crate) fn corrupt(page_id: PageId, reason: impl Into<String>) -> Self {
        TreeError::CorruptPage {
            page_id,
            reason: reason.into(),
        }
    }
}
