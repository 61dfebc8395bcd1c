//! Records Module
//!
//! The record directory: one fixed-width descriptor per record id.
//!
//! ## Responsibilities
//! - Map record id → (address, size, capacity)
//! - Reuse deleted ids before growing the file
//! - Detect unclean shutdown through the header magic
//!
//! ## File Format (`.rindex`)
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ Slot 0: Header (16 bytes)                      │
//! │ ┌──────────┬───────────┬─────────────────────┐ │
//! │ │Magic (4) │Version (4)│ Zero padding (8)    │ │
//! │ └──────────┴───────────┴─────────────────────┘ │
//! ├────────────────────────────────────────────────┤
//! │ Slot n: Descriptor for record n (16 bytes)     │
//! │ ┌────────────┬──────────┬──────────────┐       │
//! │ │Address (8) │ Size (4) │ Capacity (4) │       │
//! │ └────────────┴──────────┴──────────────┘       │
//! │ ... repeated, record n at offset n * 16       │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Size `-1` marks a free slot. Address `0` means nothing is allocated.

mod free_list;
mod table;

use std::fmt;
use std::num::NonZeroU32;

use crate::error::StoreError;

pub use table::RecordsTable;

// =============================================================================
// Shared Constants
// =============================================================================

/// Width of every slot, header included
pub const SLOT_SIZE: u64 = 16;

/// Version of the on-disk layout, folded into the safely-closed magic
pub const FORMAT_VERSION: i32 = 1;

/// Size value of a deleted slot
pub const FREE_RECORD_SIZE: i32 = -1;

pub(crate) const HEADER_MAGIC_OFFSET: u64 = 0;
pub(crate) const HEADER_VERSION_OFFSET: u64 = 4;

pub(crate) const ADDRESS_OFFSET: u64 = 0;
pub(crate) const SIZE_OFFSET: u64 = 8;
pub(crate) const CAPACITY_OFFSET: u64 = 12;

/// Written as soon as the table is modified
pub(crate) const CONNECTED_MAGIC: i32 = 0x12ad_34e4;

/// Written only by `force`/`dispose`
pub(crate) const SAFELY_CLOSED_MAGIC: i32 = 0x1f2f_3f4f_i32.wrapping_add(FORMAT_VERSION);

// =============================================================================
// Record Id
// =============================================================================

/// Identifier of a record
///
/// Slot 0 holds the directory header, so ids start at 1 and a `RecordId`
/// can never name the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(NonZeroU32);

impl RecordId {
    /// `None` for 0
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(RecordId)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Byte offset of this record's slot in the directory file
    pub(crate) fn slot_offset(self) -> u64 {
        self.get() as u64 * SLOT_SIZE
    }
}

impl TryFrom<u32> for RecordId {
    type Error = StoreError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        RecordId::new(id).ok_or(StoreError::InvalidRecordId(id))
    }
}

impl From<RecordId> for u32 {
    fn from(id: RecordId) -> Self {
        id.get()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
