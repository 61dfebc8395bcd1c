//! Data Table
//!
//! Append-oriented heap file with waste accounting.

use std::path::Path;

use crate::config::CompactionPolicy;
use crate::error::{Result, StoreError};
use crate::io::RandomAccessFile;

use super::{
    CONNECTED_MAGIC, HEADER_MAGIC_OFFSET, HEADER_SIZE, HEADER_WASTE_OFFSET, SAFELY_CLOSED_MAGIC,
};

/// The blob heap
///
/// Knows nothing about record ids: it hands out spans and counts the bytes
/// callers give back. Reclaimed spans are never reused here; only a
/// compaction rewrite recovers them.
pub struct DataTable {
    /// Backing `.data` file
    file: RandomAccessFile,

    /// Reclaimed bytes not yet recovered by compaction
    waste: u64,

    /// When `is_compact_necessary` says yes
    policy: CompactionPolicy,

    /// True if the on-disk header currently says "connected"
    dirty: bool,
}

impl DataTable {
    /// Open or create the heap at `path` with the default compaction policy
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_policy(path, CompactionPolicy::default())
    }

    /// Open or create the heap at `path`
    ///
    /// Fails with `StoreError::Corrupted` if the file exists but was not
    /// safely closed.
    pub fn open_with_policy(path: &Path, policy: CompactionPolicy) -> Result<Self> {
        let file = RandomAccessFile::open(path)?;
        let mut table = Self {
            file,
            waste: 0,
            policy,
            dirty: false,
        };

        if table.file.length() == 0 {
            table.file.put(0, &[0u8; HEADER_SIZE as usize])?;
            table.mark_dirty()?;
            tracing::debug!("Created data file {}", path.display());
            return Ok(table);
        }

        if table.file.length() < HEADER_SIZE {
            return Err(StoreError::corrupted(
                path,
                format!("data header truncated to {} bytes", table.file.length()),
            ));
        }

        let magic = table.file.get_i32(HEADER_MAGIC_OFFSET)?;
        if magic != SAFELY_CLOSED_MAGIC {
            return Err(StoreError::corrupted(
                path,
                format!(
                    "data header magic {:#010x}, expected {:#010x}",
                    magic, SAFELY_CLOSED_MAGIC
                ),
            ));
        }

        let waste = table.file.get_i32(HEADER_WASTE_OFFSET)?;
        if waste < 0 {
            return Err(StoreError::corrupted(
                path,
                format!("negative waste counter {}", waste),
            ));
        }
        table.waste = waste as u64;

        tracing::debug!(
            "Opened data file {} ({} bytes, {} wasted)",
            path.display(),
            table.file.length(),
            table.waste
        );
        Ok(table)
    }

    /// Reserve `len` bytes at the end of the file and return their address
    ///
    /// The last byte of the span is written so the file really grows.
    pub fn allocate_space(&mut self, len: u64) -> Result<u64> {
        self.mark_dirty()?;
        let address = self.file.length().max(HEADER_SIZE);
        if len > 0 {
            self.file.put(address + len - 1, &[0u8])?;
        }
        tracing::trace!("Allocated {} bytes at {}", len, address);
        Ok(address)
    }

    /// Account `len` bytes as waste; the file is not shrunk
    pub fn reclaim_space(&mut self, len: u64) -> Result<()> {
        self.mark_dirty()?;
        self.waste += len;
        tracing::trace!("Reclaimed {} bytes, waste is now {}", len, self.waste);
        Ok(())
    }

    /// True when both the absolute and the relative waste threshold are crossed
    pub fn is_compact_necessary(&self) -> bool {
        self.policy.should_compact(self.waste, self.file.length())
    }

    /// Fill `buf` from `address`
    pub fn read_bytes(&mut self, address: u64, buf: &mut [u8]) -> Result<()> {
        self.file.get(address, buf)?;
        Ok(())
    }

    /// Write `bytes` at `address`
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        self.mark_dirty()?;
        self.file.put(address, bytes)?;
        Ok(())
    }

    /// Reclaimed bytes not yet recovered
    pub fn waste(&self) -> u64 {
        self.waste
    }

    /// Current file length, header included
    pub fn file_length(&self) -> u64 {
        self.file.length()
    }

    /// True if there are modifications since the last `force`
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the waste counter, mark the header safely closed, sync
    pub fn force(&mut self) -> Result<()> {
        if self.dirty {
            // The on-disk counter is an i32; saturate rather than wrap
            let waste = i32::try_from(self.waste).unwrap_or(i32::MAX);
            self.file.put_i32(HEADER_WASTE_OFFSET, waste)?;
            self.file.put_i32(HEADER_MAGIC_OFFSET, SAFELY_CLOSED_MAGIC)?;
            self.dirty = false;
        }
        self.file.force()?;
        Ok(())
    }

    /// Final `force`, then release the file
    pub fn dispose(&mut self) -> Result<()> {
        if !self.file.is_open() {
            return Ok(());
        }
        self.force()?;
        self.file.dispose()?;
        tracing::debug!("Closed data file {}", self.file.path().display());
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn mark_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            self.file.put_i32(HEADER_MAGIC_OFFSET, CONNECTED_MAGIC)?;
            self.dirty = true;
        }
        Ok(())
    }
}
