//! # pagetree
//!
//! An embedded, single-file B+Tree storage engine with:
//! - Fixed-size slotted pages for branches and leaves
//! - A bounded LRU page cache with write-back on eviction
//! - Fixed-width multi-column keys compared column by column
//! - Range probes over a doubly-linked leaf chain
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         BPlusTree                           │
//! │          (insert / get / range_scan / all / check)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Slotted Pages                          │
//! │        (codec, insert + split, route + range probe)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Page Cache                            │
//! │              (LRU frames, dirty write-back)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Page Store                            │
//! │        (page 0 = metadata, page 1 = root, then nodes)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use pagetree::{key, BPlusTree, Config};
//!
//! let mut tree = BPlusTree::in_memory(&Config::default()).unwrap();
//! tree.insert(&key::encode(&[7]), b"seven").unwrap();
//! let value = tree.get(&key::encode(&[7])).unwrap();
//! assert_eq!(value.as_deref(), Some(&b"seven"[..]));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod page;
pub mod storage;
pub mod tree;
pub mod iter;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TreeError};
pub use config::{Config, ConfigBuilder};
pub use key::KeyOrdering;
pub use page::{Entry, NodeKind, Page, PageId};
pub use storage::{PageCache, PageStore};
pub use tree::{BPlusTree, TreeStats};
pub use iter::PageIter;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pagetree
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
