//! Configuration for recordstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a Storage instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Dataset Configuration
    // -------------------------------------------------------------------------
    /// Base path of the dataset. Two sibling files are derived from it:
    ///   {path}.rindex   (record directory)
    ///   {path}.data     (blob heap)
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// When the heap is worth rewriting
    pub compaction: CompactionPolicy,

    // -------------------------------------------------------------------------
    // Append Cache Configuration
    // -------------------------------------------------------------------------
    /// Buffered bytes above which `append_stream` flushes the cached buffer
    /// and starts a fresh one instead of reusing it
    pub append_reuse_threshold: usize,
}

/// Dual threshold deciding whether a heap compaction pays off
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    /// Minimum number of wasted bytes (exclusive)
    pub min_waste: u64,

    /// Minimum share of the heap file that is waste (exclusive)
    pub waste_ratio: f64,

    /// Compact synchronously while opening if the thresholds are met
    pub on_open: bool,
}

impl CompactionPolicy {
    /// True when `waste` bytes out of a `file_len` byte heap cross both thresholds
    pub fn should_compact(&self, waste: u64, file_len: u64) -> bool {
        if file_len == 0 {
            return false;
        }
        waste > self.min_waste && (waste as f64 / file_len as f64) > self.waste_ratio
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            min_waste: 3 * 1024 * 1024, // 3 MiB
            waste_ratio: 0.25,
            on_open: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./recordstore"),
            compaction: CompactionPolicy::default(),
            append_reuse_threshold: 4 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let ratio = self.compaction.waste_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(StoreError::Config(format!(
                "waste_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        if self.path.file_name().is_none() {
            return Err(StoreError::Config(format!(
                "dataset path {} has no file name",
                self.path.display()
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
    /// Set the dataset base path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Replace the whole compaction policy
    pub fn compaction(mut self, policy: CompactionPolicy) -> Self {
        self.config.compaction = policy;
        self
    }

    /// Set the minimum waste (in bytes) before compaction is considered
    pub fn compaction_min_waste(mut self, bytes: u64) -> Self {
        self.config.compaction.min_waste = bytes;
        self
    }

    /// Set the minimum waste ratio before compaction is considered
    pub fn compaction_waste_ratio(mut self, ratio: f64) -> Self {
        self.config.compaction.waste_ratio = ratio;
        self
    }

    /// Enable or disable compaction while opening
    pub fn compact_on_open(mut self, enabled: bool) -> Self {
        self.config.compaction.on_open = enabled;
        self
    }

    /// Set the append buffer reuse threshold (in bytes)
    pub fn append_reuse_threshold(mut self, bytes: usize) -> Self {
        self.config.append_reuse_threshold = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
