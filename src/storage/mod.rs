//! Storage Module
//!
//! Single-file page storage and the page cache in front of it.
//!
//! ## Responsibilities
//! - Allocate fixed-size pages and read/write them by id
//! - Cache decoded page bytes with LRU eviction and write-back
//! - Persist tree metadata in page 0
//!
//! ## File Layout
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────┐
//! │ Page 0       │ Page 1       │ Page 2       │ ... │
//! │ (metadata)   │ (root)       │ (tree node)  │     │
//! └──────────────┴──────────────┴──────────────┴─────┘
//!   offset = page_size * page_id
//! ```

mod cache;
mod meta;
mod store;

pub use cache::{CacheStats, Frame, FrameId, PageCache};
pub use meta::Metadata;
pub use store::{Medium, PageStore};
