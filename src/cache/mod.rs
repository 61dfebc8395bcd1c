//! Append Cache Module
//!
//! In-memory buffering that coalesces small appends before they reach the heap.
//!
//! ## Responsibilities
//! - One shared, bounded LRU of append buffers for every open Storage
//! - At most one buffer per (storage, record) pair
//! - Flush a buffer through its owning storage on eviction, force or dispose
//!
//! ## Ownership
//! ```text
//!   AppendCache (Arc, cloned into every Storage)
//!     └── LruCache<CacheKey, CachedStream>
//!           └── CachedStream
//!                 ├── owner:  Weak<dyn AppendSink>   (the Storage)
//!                 └── buffer: Arc<Mutex<AppendBuffer>> (shared with AppendStream handles)
//! ```
//!
//! ## Lock order
//! Storage lock before cache lock. A storage applies its own rotated or
//! evicted buffers while still holding its lock, so appends keep their order.
//! Buffers of other storages are flushed only after both locks are released,
//! because flushing takes the owner's storage lock.

mod append;
mod lru;
mod stream;

pub use append::{AppendCache, DEFAULT_CAPACITY};
pub use stream::AppendStream;

pub(crate) use append::{AppendSink, CacheKey};
