//! # recordstore
//!
//! An embedded record storage engine with:
//! - Byte-array records addressed by integer ids
//! - Free-id reuse and capacity headroom for cheap growth
//! - Buffered appends shared across storages through one bounded cache
//! - Safely-closed markers that detect unclean shutdown
//! - Compaction that rewrites the heap once waste piles up
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Callers                             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ RecordId
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Storage (facade)                          │
//! │       capacity growth · compaction · one mutex              │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//! ┌─────────────┐       ┌─────────────┐       ┌─────────────────┐
//! │RecordsTable │       │  DataTable  │       │   AppendCache   │
//! │  (.rindex)  │       │   (.data)   │       │ (shared by all  │
//! │ id → span   │       │  payloads   │       │    storages)    │
//! └─────────────┘       └─────────────┘       └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod io;
pub mod records;
pub mod data;
pub mod cache;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cache::{AppendCache, AppendStream};
pub use config::{CompactionPolicy, Config};
pub use error::{Result, StoreError};
pub use records::RecordId;
pub use storage::{Storage, StorageStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of recordstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
