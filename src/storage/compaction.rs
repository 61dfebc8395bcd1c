//! Heap compaction
//!
//! Copies every non-empty record into a fresh heap file, then swaps it in:
//!
//! 1. Write live payloads to `{path}.data.temp` (old heap untouched)
//! 2. Dispose both heaps, delete the old file, rename the new one into place
//! 3. Point the moved descriptors at their new spans and reopen the heap
//!
//! A crash during step 1 only loses the temp file, which the next open
//! deletes. The directory is marked dirty before step 2, so a crash during
//! steps 2 or 3 makes the next open rebuild the dataset.

use std::fs;
use std::time::Instant;

use crate::config::CompactionPolicy;
use crate::data::DataTable;
use crate::error::Result;
use crate::records::RecordId;

use super::capacity::calc_capacity;
use super::tables::Tables;
use super::{remove_if_exists, DatasetPaths};

/// New location of one record
struct Relocation {
    record: RecordId,
    address: u64,
    capacity: i32,
}

/// Rewrite the heap of `tables` without waste
pub(crate) fn compact(
    tables: &mut Tables,
    paths: &DatasetPaths,
    policy: CompactionPolicy,
) -> Result<()> {
    let started = Instant::now();
    let waste_before = tables.data.waste();
    let len_before = tables.data.file_length();

    tracing::info!(
        "Space waste in {} is {} of {} bytes, compacting",
        paths.data.display(),
        waste_before,
        len_before
    );

    let temp_path = paths.compaction_temp();
    remove_if_exists(&temp_path)?;

    let relocations = match copy_live_records(tables, &temp_path, policy) {
        Ok(relocations) => relocations,
        Err(e) => {
            // Old heap is still authoritative
            let _ = remove_if_exists(&temp_path);
            return Err(e);
        }
    };

    // Until the relocations are forced the directory must read as unclean
    tables.records.mark_dirty()?;
    tables.data.dispose()?;
    fs::remove_file(&paths.data)?;
    fs::rename(&temp_path, &paths.data)?;
    tables.data = DataTable::open_with_policy(&paths.data, policy)?;

    // Empty and free slots keep no span in the new heap
    let mut moved = 0usize;
    let mut next = relocations.iter().peekable();
    for id in 1..tables.records.records_count() {
        let record = RecordId::try_from(id as u32)?;
        match next.peek() {
            Some(relocation) if relocation.record == record => {
                tables.records.set_address(record, relocation.address)?;
                tables.records.set_capacity(record, relocation.capacity)?;
                next.next();
                moved += 1;
            }
            _ => {
                if tables.records.address(record)? != 0 || tables.records.capacity(record)? != 0 {
                    tables.records.set_address(record, 0)?;
                    tables.records.set_capacity(record, 0)?;
                }
            }
        }
    }
    tables.records.force()?;

    tracing::info!(
        "Compacted {}: {} records moved, {} -> {} bytes in {:?}",
        paths.data.display(),
        moved,
        len_before,
        tables.data.file_length(),
        started.elapsed()
    );
    Ok(())
}

/// Step 1: copy every record with a non-zero size into a new heap at `temp_path`
fn copy_live_records(
    tables: &mut Tables,
    temp_path: &std::path::Path,
    policy: CompactionPolicy,
) -> Result<Vec<Relocation>> {
    let mut fresh = DataTable::open_with_policy(temp_path, policy)?;
    let mut relocations = Vec::new();
    let mut buf = Vec::new();

    for id in 1..tables.records.records_count() {
        let record = RecordId::try_from(id as u32)?;
        let size = tables.records.size(record)?;
        if size <= 0 {
            continue;
        }
        let address = tables.records.address(record)?;
        if address == 0 {
            continue;
        }

        let capacity = calc_capacity(size as usize)?;
        buf.resize(size as usize, 0);
        tables.data.read_bytes(address, &mut buf)?;

        let new_address = fresh.allocate_space(capacity as u64)?;
        fresh.write_bytes(new_address, &buf)?;

        relocations.push(Relocation {
            record,
            address: new_address,
            capacity,
        });
    }

    fresh.dispose()?;
    Ok(relocations)
}
