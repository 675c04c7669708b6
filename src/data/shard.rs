// ============================================================
// Layer 4 — Batch Sharding
// ============================================================
// Splits one global batch across the devices of a run.
//
// The configured batch size is the GLOBAL batch size: every
// optimizer step consumes `batch_size` samples in total, and each
// device sees a contiguous slice of them.
//
// Example with 10 items on 4 devices:
//   rank 0: 0..3   rank 1: 3..6   rank 2: 6..8   rank 3: 8..10
//
// Slice lengths differ by at most one; earlier ranks take the
// remainder. Ranks that would receive nothing (a final eval batch
// smaller than the device count) get no shard at all, so no
// sample is ever counted twice.

use std::ops::Range;

/// A contiguous slice of a global batch assigned to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub rank:  usize,
    pub range: Range<usize>,
}

/// Split `total` items over `world_size` ranks, skipping empty shards.
pub fn shard_ranges(total: usize, world_size: usize) -> Vec<Shard> {
    if world_size == 0 {
        return Vec::new();
    }

    let base      = total / world_size;
    let remainder = total % world_size;

    let mut shards = Vec::with_capacity(world_size);
    let mut start  = 0usize;

    for rank in 0..world_size {
        let len = base + usize::from(rank < remainder);
        if len > 0 {
            shards.push(Shard { rank, range: start..start + len });
        }
        start += len;
    }

    shards
}
