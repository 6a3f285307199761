use chrono::{DateTime, Utc};

use crate::models::time_block::TimeBlock;

/// True when `[start, end)` strictly overlaps none of the blocks being built
/// nor the caller's committed blocks.
pub fn is_slot_available(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    scheduled: &[TimeBlock],
    existing: &[TimeBlock],
) -> bool {
    scheduled
        .iter()
        .chain(existing.iter())
        .all(|block| !block.overlaps(start, end))
}
