//! Storage facade
//!
//! The only component callers use. Owns the directory/heap pair behind one
//! exclusive lock and shares append buffers through an `AppendCache`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::buf::Reader;
use bytes::{Buf, Bytes};
use parking_lot::Mutex;

use crate::cache::{AppendCache, AppendSink, AppendStream, CacheKey};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::records::RecordId;

use super::compaction;
use super::tables::Tables;
use super::{remove_if_exists, DatasetPaths};

/// Point-in-time numbers about a dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageStats {
    /// Directory slots, header and free slots included
    pub records: u64,
    /// Slots that are not free
    pub live_records: u64,
    /// Heap file length in bytes
    pub data_file_len: u64,
    /// Reclaimed heap bytes awaiting compaction
    pub waste: u64,
    /// Caller-defined payload version
    pub version: i32,
}

/// An open record dataset
///
/// ## Concurrency:
/// - Every operation takes the instance-wide `tables` lock, so calls on
///   different records of the same storage are serialized
/// - Buffered appends live in the shared `AppendCache`; any operation on a
///   record first flushes that record's buffer into the heap
/// - `Storage` is `Send + Sync`; share it through an `Arc`
pub struct Storage {
    inner: Arc<StorageInner>,
}

/// State shared with cached append buffers
struct StorageInner {
    /// Owner id of this storage in the append cache
    owner: u64,
    paths: DatasetPaths,
    config: Config,
    cache: AppendCache,
    /// `None` once disposed
    tables: Mutex<Option<Tables>>,
}

impl Storage {
    /// Open or create the dataset described by `config`
    ///
    /// On startup:
    /// 1. Delete both files if only one of them exists
    /// 2. Open the directory and the heap; on corruption delete both and retry once
    /// 3. Compact synchronously if the heap has crossed the waste thresholds
    pub fn open(config: Config, cache: AppendCache) -> Result<Self> {
        config.validate()?;
        let paths = DatasetPaths::new(&config.path);

        if let Some(parent) = paths.base.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tables = Self::open_tables(&paths, &config)?;

        if config.compaction.on_open && tables.data.is_compact_necessary() {
            if let Err(e) = compaction::compact(&mut tables, &paths, config.compaction) {
                // A failed copy leaves both files intact; a failed swap leaves
                // the directory dirty and must stay that way
                if tables.records.is_dirty() {
                    tracing::warn!(
                        "Compaction of {} failed mid-swap, dataset will be rebuilt",
                        paths.base.display()
                    );
                } else if let Err(dispose_err) = tables.dispose() {
                    tracing::warn!(
                        "Failed to close {} after compaction error: {}",
                        paths.base.display(),
                        dispose_err
                    );
                }
                return Err(e);
            }
        }

        let owner = cache.register_owner();
        tracing::debug!(
            "Opened storage {} ({} slots, owner {})",
            paths.base.display(),
            tables.records.records_count(),
            owner
        );

        Ok(Self {
            inner: Arc::new(StorageInner {
                owner,
                paths,
                config,
                cache,
                tables: Mutex::new(Some(tables)),
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses the default config and a private append cache
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::open(config, AppendCache::default())
    }

    // =========================================================================
    // Record Lifecycle
    // =========================================================================

    /// Allocate a record id (a deleted one if available) with size 0
    pub fn create_new_record(&self) -> Result<RecordId> {
        self.with_tables(|tables| tables.records.create_new_record())
    }

    /// Free `record` for reuse
    ///
    /// Heap space is not reclaimed here; the span is recovered when the id is
    /// reused with a larger payload, or by compaction.
    pub fn delete_record(&self, record: RecordId) -> Result<()> {
        self.with_record(record, |tables| tables.records.delete_record(record))
    }

    // =========================================================================
    // Reads and Writes
    // =========================================================================

    /// Replace the payload of `record`, growing its capacity if needed
    pub fn write_bytes(&self, record: RecordId, bytes: &[u8]) -> Result<()> {
        self.with_record(record, |tables| tables.write_bytes(record, bytes, false))
    }

    /// Like `write_bytes`, but a reallocation reserves exactly `bytes.len()`
    pub fn write_bytes_fixed(&self, record: RecordId, bytes: &[u8]) -> Result<()> {
        self.with_record(record, |tables| tables.write_bytes(record, bytes, true))
    }

    /// Append `bytes` to `record`
    pub fn append_bytes(&self, record: RecordId, bytes: &[u8]) -> Result<()> {
        self.with_record(record, |tables| tables.append_bytes(record, bytes))
    }

    /// Overwrite part of `record` in place; the range must lie within its size
    pub fn replace_bytes(&self, record: RecordId, offset: usize, bytes: &[u8]) -> Result<()> {
        self.with_record(record, |tables| tables.replace_bytes(record, offset, bytes))
    }

    /// Full payload of `record`, including anything still buffered
    pub fn read_bytes(&self, record: RecordId) -> Result<Vec<u8>> {
        self.with_record(record, |tables| tables.read_bytes(record))
    }

    /// Payload of `record` as an `io::Read`
    pub fn read_stream(&self, record: RecordId) -> Result<Reader<Bytes>> {
        let bytes = self.read_bytes(record)?;
        Ok(Bytes::from(bytes).reader())
    }

    /// Buffered append handle for `record`
    ///
    /// Reuses the record's cached buffer while it holds fewer than
    /// `append_reuse_threshold` bytes; otherwise flushes it and starts a new
    /// one. Inserting may evict (and flush) another storage's buffer.
    pub fn append_stream(&self, record: RecordId) -> Result<AppendStream> {
        let inner = &self.inner;
        let sink: Arc<dyn AppendSink> = inner.clone();
        let key = CacheKey::new(inner.owner, record);

        let (buffer, flushed, foreign) = {
            let mut guard = inner.tables.lock();
            let tables = guard.as_mut().ok_or(StoreError::Closed)?;
            let (buffer, to_flush) = inner.cache.acquire(
                key,
                inner.config.append_reuse_threshold,
                Arc::downgrade(&sink),
            );

            // Own buffers go to the heap before anyone can flush the fresh one
            let mut flushed = Ok(());
            let mut foreign = Vec::new();
            for (key, stream) in to_flush {
                if key.owner == inner.owner {
                    let bytes = stream.buffer.lock().detach();
                    let applied = tables.append_bytes(key.record, &bytes);
                    flushed = flushed.and(applied);
                } else {
                    foreign.push((key, stream));
                }
            }
            (buffer, flushed, foreign)
        };

        // Another storage's lock may only be taken once ours is released
        for (key, stream) in foreign {
            stream.flush(key.record)?;
        }
        flushed?;

        Ok(AppendStream::new(record, buffer, sink))
    }

    // =========================================================================
    // Descriptor Accessors
    // =========================================================================

    /// Logical payload length of `record`
    pub fn size(&self, record: RecordId) -> Result<usize> {
        self.with_record(record, |tables| {
            Ok(tables.records.size(record)?.max(0) as usize)
        })
    }

    /// Bytes reserved for `record` in the heap
    pub fn capacity(&self, record: RecordId) -> Result<usize> {
        self.with_record(record, |tables| {
            Ok(tables.records.capacity(record)?.max(0) as usize)
        })
    }

    /// Heap offset of `record`'s span, 0 if nothing is allocated
    pub fn address(&self, record: RecordId) -> Result<u64> {
        self.with_record(record, |tables| tables.records.address(record))
    }

    /// Directory slots, header and free slots included
    pub fn records_count(&self) -> Result<u64> {
        self.with_tables(|tables| Ok(tables.records.records_count()))
    }

    /// Number of slots that are not free
    pub fn live_records_count(&self) -> Result<u64> {
        self.with_tables(|tables| Ok(tables.records.live_record_ids()?.len() as u64))
    }

    /// Ids of every slot that is not free, ascending
    pub fn live_record_ids(&self) -> Result<Vec<RecordId>> {
        self.with_tables(|tables| tables.records.live_record_ids())
    }

    /// Verify that `record`'s descriptor fits inside the heap
    pub fn check_sanity(&self, record: RecordId) -> Result<()> {
        let paths = &self.inner.paths;
        self.with_tables(|tables| tables.check_sanity(record, paths))
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Caller-defined payload schema version
    pub fn version(&self) -> Result<i32> {
        self.with_tables(|tables| tables.records.version())
    }

    pub fn set_version(&self, version: i32) -> Result<()> {
        self.with_tables(|tables| tables.records.set_version(version))
    }

    /// True if either file has changes since the last `force`
    pub fn is_dirty(&self) -> Result<bool> {
        self.with_tables(|tables| Ok(tables.records.is_dirty() || tables.data.is_dirty()))
    }

    pub fn stats(&self) -> Result<StorageStats> {
        self.with_tables(|tables| {
            Ok(StorageStats {
                records: tables.records.records_count(),
                live_records: tables.records.live_record_ids()?.len() as u64,
                data_file_len: tables.data.file_length(),
                waste: tables.data.waste(),
                version: tables.records.version()?,
            })
        })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rewrite the heap without waste, regardless of the thresholds
    pub fn compact(&self) -> Result<()> {
        let inner = &self.inner;
        self.with_tables(|tables| {
            inner.flush_owned_streams(tables)?;
            compaction::compact(tables, &inner.paths, inner.config.compaction)
        })
    }

    /// Flush this storage's buffered appends and mark both files safely closed
    pub fn force(&self) -> Result<()> {
        let inner = &self.inner;
        self.with_tables(|tables| {
            inner.flush_owned_streams(tables)?;
            tables.force()
        })
    }

    /// Force, then release both files. Later calls fail with `Closed`;
    /// disposing twice is a no-op.
    pub fn dispose(&self) -> Result<()> {
        let mut guard = self.inner.tables.lock();
        let Some(mut tables) = guard.take() else {
            return Ok(());
        };

        let flushed = self.inner.flush_owned_streams(&mut tables);
        let disposed = tables.dispose();
        tracing::debug!("Closed storage {}", self.inner.paths.base.display());
        flushed.and(disposed)
    }

    /// True once `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.inner.tables.lock().is_none()
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Dataset base path
    pub fn path(&self) -> &Path {
        &self.inner.paths.base
    }

    /// Path of the record directory file
    pub fn records_file(&self) -> &Path {
        &self.inner.paths.records
    }

    /// Path of the heap file
    pub fn data_file(&self) -> &Path {
        &self.inner.paths.data
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Open both tables, rebuilding the dataset on a mismatched pair or corruption
    fn open_tables(paths: &DatasetPaths, config: &Config) -> Result<Tables> {
        // Leftover from a compaction that did not finish
        remove_if_exists(&paths.compaction_temp())?;

        let records_exist = paths.records.exists();
        let data_exists = paths.data.exists();
        if records_exist != data_exists {
            tracing::warn!(
                "Only one of {} and {} exists, recreating both",
                paths.records.display(),
                paths.data.display()
            );
            paths.remove_files()?;
        }

        match Tables::open(paths, config.compaction) {
            Ok(tables) => Ok(tables),
            Err(e) if e.is_corruption() => {
                tracing::warn!("{}; deleting and recreating the dataset", e);
                paths.remove_files()?;
                Tables::open(paths, config.compaction)
            }
            Err(e) => Err(e),
        }
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.tables.lock();
        let tables = guard.as_mut().ok_or(StoreError::Closed)?;
        f(tables)
    }

    /// Like `with_tables`, after flushing `record`'s buffered appends
    fn with_record<T>(
        &self,
        record: RecordId,
        f: impl FnOnce(&mut Tables) -> Result<T>,
    ) -> Result<T> {
        let inner = &self.inner;
        self.with_tables(|tables| {
            inner.flush_cached(tables, record)?;
            f(tables)
        })
    }
}

impl StorageInner {
    /// Apply and drop the cached buffer of `record`, if any
    fn flush_cached(&self, tables: &mut Tables, record: RecordId) -> Result<()> {
        if let Some(stream) = self.cache.take(CacheKey::new(self.owner, record)) {
            let bytes = stream.buffer.lock().detach();
            tables.append_bytes(record, &bytes)?;
        }
        Ok(())
    }

    /// Apply and drop every cached buffer owned by this storage
    fn flush_owned_streams(&self, tables: &mut Tables) -> Result<()> {
        for (key, stream) in self.cache.take_owner(self.owner) {
            let bytes = stream.buffer.lock().detach();
            tables.append_bytes(key.record, &bytes)?;
        }
        Ok(())
    }
}

impl AppendSink for StorageInner {
    fn flush_appended(&self, record: RecordId, bytes: &[u8]) -> Result<()> {
        let mut guard = self.tables.lock();
        let tables = guard.as_mut().ok_or(StoreError::Closed)?;
        tables.append_bytes(record, bytes)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::error!(
                "Failed to dispose storage {}: {}",
                self.inner.paths.base.display(),
                e
            );
        }
    }
}
