//! Records Table
//!
//! Fixed-stride descriptor array with free-slot reuse and a dirty/clean header.

use std::path::Path;

use crate::error::{Result, StoreError};
use crate::io::RandomAccessFile;

use super::free_list::FreeList;
use super::{
    RecordId, ADDRESS_OFFSET, CAPACITY_OFFSET, CONNECTED_MAGIC, FREE_RECORD_SIZE,
    HEADER_MAGIC_OFFSET, HEADER_VERSION_OFFSET, SAFELY_CLOSED_MAGIC, SIZE_OFFSET, SLOT_SIZE,
};

/// The record directory
///
/// ## Header protocol:
/// - A freshly created file is written with `CONNECTED_MAGIC`
/// - The first mutation after open/force writes `CONNECTED_MAGIC`
/// - `force`/`dispose` write `SAFELY_CLOSED_MAGIC`
/// - `open` refuses any non-empty file whose magic is not `SAFELY_CLOSED_MAGIC`
pub struct RecordsTable {
    /// Backing `.rindex` file
    file: RandomAccessFile,

    /// Lazily scanned free slot ids
    free_list: FreeList,

    /// True if the on-disk header currently says "connected"
    dirty: bool,
}

impl RecordsTable {
    /// Open or create the directory at `path`
    ///
    /// Fails with `StoreError::Corrupted` if the file exists but was not
    /// safely closed (or was written by another format version).
    pub fn open(path: &Path) -> Result<Self> {
        let file = RandomAccessFile::open(path)?;
        let mut table = Self {
            file,
            free_list: FreeList::NotScanned,
            dirty: false,
        };

        if table.file.length() == 0 {
            // Slot 0 is the header, zeroed apart from the magic
            table.file.put(0, &[0u8; SLOT_SIZE as usize])?;
            table.mark_dirty()?;
            tracing::debug!("Created record directory {}", path.display());
            return Ok(table);
        }

        if table.file.length() < SLOT_SIZE {
            return Err(StoreError::corrupted(
                path,
                format!("directory header truncated to {} bytes", table.file.length()),
            ));
        }

        let magic = table.file.get_i32(HEADER_MAGIC_OFFSET)?;
        if magic != SAFELY_CLOSED_MAGIC {
            return Err(StoreError::corrupted(
                path,
                format!(
                    "directory header magic {:#010x}, expected {:#010x}",
                    magic, SAFELY_CLOSED_MAGIC
                ),
            ));
        }

        tracing::debug!(
            "Opened record directory {} with {} slots",
            path.display(),
            table.records_count()
        );
        Ok(table)
    }

    /// Allocate a record id, reusing a deleted slot if one exists
    ///
    /// A reused slot keeps its address and capacity; only its size is reset to 0.
    pub fn create_new_record(&mut self) -> Result<RecordId> {
        self.mark_dirty()?;
        self.ensure_free_list_scanned()?;

        if let Some(id) = self.free_list.pop() {
            let record = RecordId::try_from(id)?;
            self.file
                .put_i32(record.slot_offset() + SIZE_OFFSET, 0)?;
            return Ok(record);
        }

        let id = u32::try_from(self.records_count())
            .map_err(|_| StoreError::Storage("record directory is full".to_string()))?;
        let record = RecordId::try_from(id)?;
        self.file
            .put(record.slot_offset(), &[0u8; SLOT_SIZE as usize])?;
        Ok(record)
    }

    /// Mark a record free and remember it for reuse
    ///
    /// Address and capacity are left untouched.
    pub fn delete_record(&mut self, record: RecordId) -> Result<()> {
        self.set_size(record, FREE_RECORD_SIZE)?;
        self.free_list.push(record.get());
        Ok(())
    }

    /// Number of slots, header included
    pub fn records_count(&self) -> u64 {
        self.file.length() / SLOT_SIZE
    }

    /// True if the record's slot is free
    pub fn is_free(&mut self, record: RecordId) -> Result<bool> {
        Ok(self.size(record)? == FREE_RECORD_SIZE)
    }

    /// Ids of every slot that is not free
    pub fn live_record_ids(&mut self) -> Result<Vec<RecordId>> {
        let mut ids = Vec::new();
        for id in 1..self.records_count() {
            let record = RecordId::try_from(id as u32)?;
            if !self.is_free(record)? {
                ids.push(record);
            }
        }
        Ok(ids)
    }

    // =========================================================================
    // Descriptor Fields
    // =========================================================================

    pub fn address(&mut self, record: RecordId) -> Result<u64> {
        let address = self.file.get_i64(record.slot_offset() + ADDRESS_OFFSET)?;
        Ok(address as u64)
    }

    pub fn set_address(&mut self, record: RecordId, address: u64) -> Result<()> {
        self.mark_dirty()?;
        self.file
            .put_i64(record.slot_offset() + ADDRESS_OFFSET, address as i64)?;
        Ok(())
    }

    pub fn size(&mut self, record: RecordId) -> Result<i32> {
        Ok(self.file.get_i32(record.slot_offset() + SIZE_OFFSET)?)
    }

    pub fn set_size(&mut self, record: RecordId, size: i32) -> Result<()> {
        self.mark_dirty()?;
        self.file.put_i32(record.slot_offset() + SIZE_OFFSET, size)?;
        Ok(())
    }

    pub fn capacity(&mut self, record: RecordId) -> Result<i32> {
        Ok(self.file.get_i32(record.slot_offset() + CAPACITY_OFFSET)?)
    }

    pub fn set_capacity(&mut self, record: RecordId, capacity: i32) -> Result<()> {
        self.mark_dirty()?;
        self.file
            .put_i32(record.slot_offset() + CAPACITY_OFFSET, capacity)?;
        Ok(())
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Caller-defined payload schema version
    pub fn version(&mut self) -> Result<i32> {
        Ok(self.file.get_i32(HEADER_VERSION_OFFSET)?)
    }

    pub fn set_version(&mut self, version: i32) -> Result<()> {
        self.mark_dirty()?;
        self.file.put_i32(HEADER_VERSION_OFFSET, version)?;
        Ok(())
    }

    /// True if there are modifications since the last `force`
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the header safely closed and sync to disk
    pub fn force(&mut self) -> Result<()> {
        if self.dirty {
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
        tracing::debug!("Closed record directory {}", self.file.path().display());
        Ok(())
    }

    /// Write the "connected" magic now, ahead of the mutations that follow
    pub(crate) fn mark_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            self.file.put_i32(HEADER_MAGIC_OFFSET, CONNECTED_MAGIC)?;
            self.dirty = true;
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Full scan for slots with size -1, done once per process
    fn ensure_free_list_scanned(&mut self) -> Result<()> {
        if self.free_list.is_scanned() {
            return Ok(());
        }

        let mut ids = Vec::new();
        for id in 1..self.records_count() {
            let offset = id * SLOT_SIZE + SIZE_OFFSET;
            if self.file.get_i32(offset)? == FREE_RECORD_SIZE {
                ids.push(id as u32);
            }
        }
        tracing::trace!(
            "Scanned {} for free slots: {} found",
            self.file.path().display(),
            ids.len()
        );
        self.free_list = FreeList::Scanned(ids);
        Ok(())
    }
}
