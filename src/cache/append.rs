//! Shared append cache
//!
//! Bounds the memory held by buffered appends across all open storages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::error::Result;
use crate::records::RecordId;

use super::lru::LruCache;

/// Default number of buffers kept before the least recently used is flushed
pub const DEFAULT_CAPACITY: usize = 10;

/// Where a flushed append buffer goes
///
/// Implemented by the storage that owns the buffer. Called without any
/// cache lock held.
pub(crate) trait AppendSink: Send + Sync {
    fn flush_appended(&self, record: RecordId, bytes: &[u8]) -> Result<()>;
}

/// Cache key: owning storage plus record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) owner: u64,
    pub(crate) record: RecordId,
}

impl CacheKey {
    pub(crate) fn new(owner: u64, record: RecordId) -> Self {
        Self { owner, record }
    }
}

/// Bytes appended since the last flush
#[derive(Debug, Default)]
pub(crate) struct AppendBuffer {
    pub(crate) data: BytesMut,
    /// Set once the buffer has left the cache; writers then go straight to
    /// the storage instead
    pub(crate) detached: bool,
}

impl AppendBuffer {
    /// Mark detached and take whatever was buffered
    pub(crate) fn detach(&mut self) -> Bytes {
        self.detached = true;
        self.data.split().freeze()
    }
}

/// A cached buffer and the storage it belongs to
#[derive(Clone)]
pub(crate) struct CachedStream {
    pub(crate) owner: Weak<dyn AppendSink>,
    pub(crate) buffer: Arc<Mutex<AppendBuffer>>,
}

impl CachedStream {
    fn new(owner: Weak<dyn AppendSink>) -> Self {
        Self {
            owner,
            buffer: Arc::new(Mutex::new(AppendBuffer::default())),
        }
    }

    fn buffered_len(&self) -> usize {
        self.buffer.lock().data.len()
    }

    /// Detach the buffer and hand its bytes to the owning storage
    ///
    /// Must not be called with the cache lock held.
    pub(crate) fn flush(&self, record: RecordId) -> Result<()> {
        let bytes = self.buffer.lock().detach();
        if bytes.is_empty() {
            return Ok(());
        }
        match self.owner.upgrade() {
            Some(owner) => owner.flush_appended(record, &bytes),
            None => {
                tracing::warn!(
                    "Dropping {} buffered bytes for record {}: storage already released",
                    bytes.len(),
                    record
                );
                Ok(())
            }
        }
    }
}

/// Process-wide cache of append buffers
///
/// Cheap to clone; every clone shares the same entries. Create one per
/// process (or per group of storages that should share a memory bound) and
/// pass it to `Storage::open`.
#[derive(Clone)]
pub struct AppendCache {
    shared: Arc<Shared>,
}

struct Shared {
    /// Source of storage owner ids
    next_owner: AtomicU64,
    streams: Mutex<LruCache<CacheKey, CachedStream>>,
}

impl AppendCache {
    /// Create a cache holding at most `capacity` buffers (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                next_owner: AtomicU64::new(1),
                streams: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Number of buffers currently cached
    pub fn len(&self) -> usize {
        self.shared.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached buffers
    pub fn capacity(&self) -> usize {
        self.shared.streams.lock().capacity()
    }

    // =========================================================================
    // Crate-internal API (used by Storage)
    // =========================================================================

    /// Hand out a unique owner id for a new storage
    pub(crate) fn register_owner(&self) -> u64 {
        self.shared.next_owner.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the buffer for `key`, creating one if needed
    ///
    /// An existing buffer holding `reuse_threshold` bytes or more is replaced
    /// by a fresh one. Returns the buffer plus every entry that left the
    /// cache (rotated or evicted); the caller must flush those after this
    /// returns, oldest first.
    pub(crate) fn acquire(
        &self,
        key: CacheKey,
        reuse_threshold: usize,
        owner: Weak<dyn AppendSink>,
    ) -> (Arc<Mutex<AppendBuffer>>, Vec<(CacheKey, CachedStream)>) {
        let mut streams = self.shared.streams.lock();
        let mut to_flush = Vec::new();

        if let Some(existing) = streams.get(&key) {
            if existing.buffered_len() < reuse_threshold {
                return (Arc::clone(&existing.buffer), to_flush);
            }
            if let Some(full) = streams.remove(&key) {
                to_flush.push((key, full));
            }
        }

        let stream = CachedStream::new(owner);
        let buffer = Arc::clone(&stream.buffer);
        if let Some(evicted) = streams.insert(key, stream) {
            to_flush.push(evicted);
        }
        (buffer, to_flush)
    }

    /// Remove the buffer for `key`, if any
    pub(crate) fn take(&self, key: CacheKey) -> Option<CachedStream> {
        self.shared.streams.lock().remove(&key)
    }

    /// Remove every buffer belonging to `owner`
    pub(crate) fn take_owner(&self, owner: u64) -> Vec<(CacheKey, CachedStream)> {
        self.shared
            .streams
            .lock()
            .remove_where(|key| key.owner == owner)
    }
}

impl Default for AppendCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
