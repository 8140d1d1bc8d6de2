//! Allocation churn fixture for memory-limit checks.

use rand::Rng;
use tracing::debug;

/// Default number of blocks.
pub const DEFAULT_BLOCKS: usize = 100;

/// Default block size: 1 MiB.
pub const DEFAULT_BLOCK_BYTES: usize = 1024 * 1024;

/// Allocate `blocks` blocks of `block_bytes` each, fill them with random
/// bytes so every page is touched, then free them all.
///
/// Peak usage is `blocks * block_bytes`; the return value is that total.
#[must_use]
pub fn churn_allocations(blocks: usize, block_bytes: usize) -> usize {
    let mut rng = rand::thread_rng();
    let mut held: Vec<Vec<u8>> = Vec::with_capacity(blocks);

    for _ in 0..blocks {
        let mut block = vec![0u8; block_bytes];
        rng.fill(block.as_mut_slice());
        held.push(block);
    }

    let total: usize = std::hint::black_box(&held).iter().map(Vec::len).sum();
    debug!(blocks, block_bytes, total, "alloc: releasing blocks");
    drop(held);
    total
}
