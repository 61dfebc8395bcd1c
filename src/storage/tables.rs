//! Record operations over the directory + heap pair
//!
//! Everything here runs with the storage lock held.

use crate::config::CompactionPolicy;
use crate::data::{DataTable, HEADER_SIZE};
use crate::error::{Result, StoreError};
use crate::records::{RecordId, RecordsTable, FREE_RECORD_SIZE};

use super::capacity::calc_capacity;
use super::DatasetPaths;

/// The directory and heap of one dataset
pub(crate) struct Tables {
    pub(crate) records: RecordsTable,
    pub(crate) data: DataTable,
}

impl Tables {
    /// Open both files; either one failing its header check is `Corrupted`
    pub(crate) fn open(paths: &DatasetPaths, policy: CompactionPolicy) -> Result<Self> {
        let records = RecordsTable::open(&paths.records)?;
        let data = DataTable::open_with_policy(&paths.data, policy)?;
        Ok(Self { records, data })
    }

    /// Replace the payload of `record`
    ///
    /// Reuses the current span if it is large enough, otherwise gives the old
    /// span back as waste and allocates a new one. With `fixed_size` the new
    /// span is exactly `bytes.len()`.
    pub(crate) fn write_bytes(
        &mut self,
        record: RecordId,
        bytes: &[u8],
        fixed_size: bool,
    ) -> Result<()> {
        let required = bytes.len();
        let size = i32::try_from(required).map_err(|_| StoreError::RecordTooLarge(required))?;

        let current_size = self.records.size(record)?;
        if required == 0 && current_size == 0 {
            return Ok(());
        }

        let capacity = self.records.capacity(record)?;
        let mut address = self.records.address(record)?;

        if required > capacity.max(0) as usize {
            if capacity > 0 {
                self.data.reclaim_space(capacity as u64)?;
            }

            let new_capacity = if fixed_size {
                size
            } else {
                calc_capacity(required)?
            };
            address = self.data.allocate_space(new_capacity as u64)?;
            self.records.set_address(record, address)?;
            self.records.set_capacity(record, new_capacity)?;
        }

        self.data.write_bytes(address, bytes)?;
        self.records.set_size(record, size)?;
        Ok(())
    }

    /// Append `bytes` to `record`
    ///
    /// In place when the capacity allows, otherwise read, concatenate and
    /// rewrite through `write_bytes`.
    pub(crate) fn append_bytes(&mut self, record: RecordId, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let size = self.records.size(record)?.max(0) as usize;
        let capacity = self.records.capacity(record)?.max(0) as usize;
        let new_size = size + bytes.len();
        let new_size_i32 =
            i32::try_from(new_size).map_err(|_| StoreError::RecordTooLarge(new_size))?;

        if new_size <= capacity {
            let address = self.records.address(record)?;
            self.data.write_bytes(address + size as u64, bytes)?;
            self.records.set_size(record, new_size_i32)?;
            return Ok(());
        }

        let mut joined = self.read_bytes(record)?;
        joined.reserve(bytes.len());
        joined.extend_from_slice(bytes);
        self.write_bytes(record, &joined, false)
    }

    /// Current payload of `record`; empty without touching the heap if size is 0
    pub(crate) fn read_bytes(&mut self, record: RecordId) -> Result<Vec<u8>> {
        let size = self.records.size(record)?;
        if size <= 0 {
            return Ok(Vec::new());
        }

        let address = self.records.address(record)?;
        let mut buf = vec![0u8; size as usize];
        self.data.read_bytes(address, &mut buf)?;
        Ok(buf)
    }

    /// Overwrite `bytes.len()` bytes of `record` starting at `offset`
    pub(crate) fn replace_bytes(
        &mut self,
        record: RecordId,
        offset: usize,
        bytes: &[u8],
    ) -> Result<()> {
        let size = self.records.size(record)?.max(0) as usize;
        if offset.checked_add(bytes.len()).map_or(true, |end| end > size) {
            return Err(StoreError::OutOfBounds {
                record: record.get(),
                offset,
                len: bytes.len(),
                size,
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let address = self.records.address(record)?;
        self.data.write_bytes(address + offset as u64, bytes)
    }

    /// Check that the descriptor of `record` is consistent with the heap
    pub(crate) fn check_sanity(&mut self, record: RecordId, paths: &DatasetPaths) -> Result<()> {
        let size = self.records.size(record)?;
        if size == FREE_RECORD_SIZE {
            return Ok(());
        }

        let capacity = self.records.capacity(record)?;
        let address = self.records.address(record)?;
        let file_len = self.data.file_length();

        let end = address.checked_add(capacity.max(0) as u64);

        let problem = if size < 0 || capacity < 0 {
            Some(format!("record {} has size {} and capacity {}", record, size, capacity))
        } else if size > capacity {
            Some(format!("record {} size {} exceeds capacity {}", record, size, capacity))
        } else if capacity > 0 && address < HEADER_SIZE {
            Some(format!("record {} address {} inside heap header", record, address))
        } else if capacity > 0 {
            match end {
                Some(end) if end <= file_len => None,
                Some(end) => Some(format!(
                    "record {} span {}..{} past end of heap ({} bytes)",
                    record, address, end, file_len
                )),
                None => Some(format!(
                    "record {} span at {} with capacity {} overflows",
                    record, address, capacity
                )),
            }
        } else {
            None
        };

        match problem {
            Some(reason) => Err(StoreError::corrupted(&paths.base, reason)),
            None => Ok(()),
        }
    }

    pub(crate) fn force(&mut self) -> Result<()> {
        self.records.force()?;
        self.data.force()
    }

    /// Dispose both tables, attempting the heap even if the directory fails
    pub(crate) fn dispose(&mut self) -> Result<()> {
        let records = self.records.dispose();
        let data = self.data.dispose();
        records.and(data)
    }
}
