//! Memory management.
//!
//! There is no virtual-memory subsystem in this kernel; the heap
//! allocator over a fixed, statically located arena backs all runtime
//! allocation.

pub mod heap;

pub use heap::{FreeListAllocator, HeapStats, LockedHeap};
