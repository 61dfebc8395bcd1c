//! Free record list
//!
//! Ids of deleted slots, built lazily by a full directory scan and never
//! persisted.

/// Deleted slot ids available for reuse
#[derive(Debug, Default)]
pub(crate) enum FreeList {
    /// The directory has not been scanned in this process yet
    #[default]
    NotScanned,
    /// Every free slot id, in scan order
    Scanned(Vec<u32>),
}

impl FreeList {
    pub(crate) fn is_scanned(&self) -> bool {
        matches!(self, FreeList::Scanned(_))
    }

    /// Remember a freshly deleted id. Before the first scan this is a no-op:
    /// the scan will find the slot on its own.
    pub(crate) fn push(&mut self, id: u32) {
        if let FreeList::Scanned(ids) = self {
            ids.push(id);
        }
    }

    /// Take a free id. `None` if empty or not scanned yet.
    pub(crate) fn pop(&mut self) -> Option<u32> {
        match self {
            FreeList::Scanned(ids) => ids.pop(),
            FreeList::NotScanned => None,
        }
    }
}
