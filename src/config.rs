//! Configuration for pagetree
//!
//! Centralized configuration with sensible defaults. Every knob is passed
//! explicitly into the store, cache and tree; nothing is read from the
//! environment.

use crate::error::{Result, TreeError};
use crate::key::COLUMN_SIZE;
use crate::page::{HEADER_SIZE, SLOT_SIZE};

/// Native page size in bytes
pub const PAGE_SIZE: usize = 4 * 1024;

/// Smallest physical page size accepted by `Config::validate`
pub const MIN_PAGE_SIZE: usize = 64;

/// Main configuration for a tree instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Page Configuration
    // -------------------------------------------------------------------------
    /// Physical page size; every page on disk is exactly this long
    pub page_size: usize,

    /// A page splits once its used bytes exceed this value.
    /// Lowering it makes splits reachable with a handful of entries.
    pub split_threshold: usize,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Number of frames in the page cache
    pub pool_capacity: usize,

    // -------------------------------------------------------------------------
    // Tree Configuration
    // -------------------------------------------------------------------------
    /// Key width in bytes used when creating a new tree.
    /// Ignored on open: the width persisted in the metadata page wins.
    pub key_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            split_threshold: PAGE_SIZE,
            pool_capacity: 64,
            key_width: COLUMN_SIZE as u32,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the page layout or the cache cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(TreeError::InvalidArgument(format!(
                "page size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.split_threshold < HEADER_SIZE + SLOT_SIZE || self.split_threshold > self.page_size
        {
            return Err(TreeError::InvalidArgument(format!(
                "split threshold {} must be within [{}, {}]",
                self.split_threshold,
                HEADER_SIZE + SLOT_SIZE,
                self.page_size
            )));
        }
        if self.pool_capacity == 0 {
            return Err(TreeError::InvalidArgument(
                "pool capacity must be at least 1".to_string(),
            ));
        }
        if self.key_width == 0 || self.key_width as usize % COLUMN_SIZE != 0 {
            return Err(TreeError::InvalidArgument(format!(
                "key width {} is not a positive multiple of {}",
                self.key_width, COLUMN_SIZE
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the physical page size.
    /// The split threshold follows it unless set explicitly afterwards.
    pub fn page_size(mut self, size: usize) -> Self {
        if self.config.split_threshold == self.config.page_size {
            self.config.split_threshold = size;
        }
        self.config.page_size = size;
        self
    }

    /// Set the used-bytes limit above which a page splits
    pub fn split_threshold(mut self, bytes: usize) -> Self {
        self.config.split_threshold = bytes;
        self
    }

    /// Set the number of cache frames
    pub fn pool_capacity(mut self, frames: usize) -> Self {
        self.config.pool_capacity = frames;
        self
    }

    /// Set the key width (bytes) for newly created trees
    pub fn key_width(mut self, bytes: u32) -> Self {
        self.config.key_width = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
