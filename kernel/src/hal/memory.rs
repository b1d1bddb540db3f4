//! Memory capability domain.

use crate::memory::heap::{self, HeapStats};

/// Queries against the kernel heap. All answers are `None` until the
/// boot sequence has initialised the arena.
pub trait MemoryOps: Sync {
    fn stats(&self) -> Option<HeapStats>;
    /// Arena bounds as (base address, size in bytes).
    fn arena(&self) -> Option<(usize, usize)>;
}

/// Backend over the global arena allocator.
pub struct ArenaMemory;

impl MemoryOps for ArenaMemory {
    fn stats(&self) -> Option<HeapStats> {
        heap::ALLOCATOR.stats()
    }

    fn arena(&self) -> Option<(usize, usize)> {
        heap::ALLOCATOR.arena()
    }
}
