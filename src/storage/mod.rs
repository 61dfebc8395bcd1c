//! Storage Module
//!
//! The record-oriented facade over the record directory and the blob heap.
//!
//! ## Responsibilities
//! - Resolve record id → descriptor → heap span
//! - Capacity growth on write/append
//! - Buffered appends through the shared append cache
//! - Rebuild on corruption or a mismatched file pair
//! - Compaction when waste crosses the configured thresholds
//!
//! ## Dataset Layout
//! ```text
//!   {path}.rindex        record directory (RecordsTable)
//!   {path}.data          blob heap (DataTable)
//!   {path}.data.temp     compaction output, only while compacting
//! ```

mod capacity;
mod compaction;
mod facade;
mod tables;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use capacity::{calc_capacity, POWER_OF_TWO_LIMIT};
pub use facade::{Storage, StorageStats};

/// File name suffix of the record directory
pub const RECORDS_SUFFIX: &str = ".rindex";

/// File name suffix of the blob heap
pub const DATA_SUFFIX: &str = ".data";

const COMPACTION_SUFFIX: &str = ".temp";

/// The files making up one dataset
#[derive(Debug, Clone)]
pub(crate) struct DatasetPaths {
    pub(crate) base: PathBuf,
    pub(crate) records: PathBuf,
    pub(crate) data: PathBuf,
}

impl DatasetPaths {
    pub(crate) fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            records: with_suffix(base, RECORDS_SUFFIX),
            data: with_suffix(base, DATA_SUFFIX),
        }
    }

    /// Where compaction writes the new heap before swapping it in
    pub(crate) fn compaction_temp(&self) -> PathBuf {
        with_suffix(&self.data, COMPACTION_SUFFIX)
    }

    /// Delete both dataset files and any compaction leftover
    pub(crate) fn remove_files(&self) -> io::Result<()> {
        remove_if_exists(&self.records)?;
        remove_if_exists(&self.data)?;
        remove_if_exists(&self.compaction_temp())
    }
}

/// `base` with `suffix` appended to its file name (`foo` → `foo.rindex`)
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
