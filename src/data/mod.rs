//! Data Module
//!
//! The blob heap: raw record payloads at directory-assigned offsets.
//!
//! ## Responsibilities
//! - Bump-pointer allocation at end of file
//! - Account reclaimed-but-not-reused bytes as waste
//! - Decide when a compaction pays off
//! - Detect unclean shutdown through the header magic
//!
//! ## File Format (`.data`)
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (32 bytes)                       │
//! │ ┌──────────┬──────────┬───────────────┐ │
//! │ │Magic (4) │Waste (4) │ Reserved (24) │ │
//! │ └──────────┴──────────┴───────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Payloads (no intrinsic structure)       │
//! └─────────────────────────────────────────┘
//! ```

mod table;

pub use table::DataTable;

// =============================================================================
// Shared Constants
// =============================================================================

/// Size of the heap header; the first allocation starts here
pub const HEADER_SIZE: u64 = 32;

pub(crate) const HEADER_MAGIC_OFFSET: u64 = 0;
pub(crate) const HEADER_WASTE_OFFSET: u64 = 4;

pub(crate) const CONNECTED_MAGIC: i32 = 0x12ad_34e4;
pub(crate) const SAFELY_CLOSED_MAGIC: i32 = 0x1f2f_3f4f;
