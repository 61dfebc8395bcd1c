//! Capacity growth policy

use crate::error::{Result, StoreError};

/// Below this size capacities are rounded up to a power of two
pub const POWER_OF_TWO_LIMIT: usize = 2048;

/// Bytes to reserve for a record that needs `required` bytes
///
/// Small records double (cheap amortized appends); large records get 50%
/// headroom. Zero stays zero.
pub fn calc_capacity(required: usize) -> Result<i32> {
    if required > i32::MAX as usize {
        return Err(StoreError::RecordTooLarge(required));
    }

    let capacity = match required {
        0 => 0,
        n if n < POWER_OF_TWO_LIMIT => n.next_power_of_two() as u64,
        n => n as u64 * 3 / 2,
    };
    // Headroom is best effort: clamp to what a descriptor can hold
    Ok(capacity.min(i32::MAX as u64) as i32)
}
