//! Kernel heap — a first-fit free-list allocator over a static arena.
//!
//! Every block in the arena starts with a [`BlockHeader`] giving its
//! payload size, a link to the next header in address order, and a free
//! flag. The chain of headers, starting at the arena base, exactly tiles
//! the arena: a block's payload size plus the header size is the byte
//! distance to the next header, and the last block runs to the arena
//! end. Allocation scans the chain for the first free block that fits
//! and splits off the remainder when it is big enough to be useful;
//! freeing flips the flag and merges with the immediately-following
//! free neighbor. There is no backward coalescing — repeated alloc/free
//! churn at small sizes fragments the arena over time, which is an
//! accepted trade-off, not a defect to mask.
//!
//! [`LockedHeap`] wraps the allocator for global use: every operation
//! runs with interrupts masked, so a trap handler that allocates cannot
//! corrupt an allocation in progress on the interrupted path.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use core::ptr::{self, NonNull};

use crate::sync::IrqSpinLock;

/// Allocation granule: payload sizes are rounded up to this and payload
/// addresses are aligned to it.
pub const GRANULE: usize = 16;

/// Bytes reserved for a block header: `size_of::<BlockHeader>` rounded
/// up to the granule so payloads stay aligned.
const HEADER_SIZE: usize = 32;

const _: () = assert!(core::mem::size_of::<BlockHeader>() <= HEADER_SIZE);
const _: () = assert!(HEADER_SIZE % GRANULE == 0);

/// One allocation unit in the arena.
///
/// Lives at the start of its block; the payload begins `HEADER_SIZE`
/// bytes after it. `size` excludes the header. `next` orders blocks by
/// address, independent of their free/used state.
#[repr(C)]
struct BlockHeader {
    size: usize,
    next: *mut BlockHeader,
    free: bool,
}

const fn round_up(n: usize, granule: usize) -> usize {
    (n + granule - 1) & !(granule - 1)
}

/// First-fit free-list allocator over one contiguous arena.
pub struct FreeListAllocator {
    base: *mut u8,
    arena_size: usize,
}

// SAFETY: The allocator owns its arena exclusively; it is only ever
// accessed through the IrqSpinLock in LockedHeap (or a single test
// thread), never aliased across threads.
unsafe impl Send for FreeListAllocator {}

impl FreeListAllocator {
    /// Establish the initial single free block spanning the arena.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `arena_size` bytes,
    /// aligned to [`GRANULE`], exclusively owned by the allocator for
    /// its whole lifetime, and `arena_size` must leave room for a
    /// header plus one granule of payload.
    pub unsafe fn new(base: *mut u8, arena_size: usize) -> Self {
        debug_assert!(base as usize % GRANULE == 0);
        debug_assert!(arena_size >= HEADER_SIZE + GRANULE);
        let first = base as *mut BlockHeader;
        // SAFETY: Caller guarantees the arena covers at least one header.
        unsafe {
            first.write(BlockHeader {
                size: arena_size - HEADER_SIZE,
                next: ptr::null_mut(),
                free: true,
            });
        }
        Self { base, arena_size }
    }

    /// Allocate `size` bytes, first-fit.
    ///
    /// Returns `None` when no free block fits — a recoverable condition
    /// (fragmentation or exhaustion) that is never retried internally.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let need = round_up(size.max(1), GRANULE);

        let mut cur = self.base as *mut BlockHeader;
        while !cur.is_null() {
            // SAFETY: `cur` came from the chain, which by the tiling
            // invariant only contains headers inside the arena.
            unsafe {
                if (*cur).free && (*cur).size >= need {
                    self.split(cur, need);
                    (*cur).free = false;
                    let payload = cur.cast::<u8>().add(HEADER_SIZE);
                    return Some(NonNull::new_unchecked(payload));
                }
                cur = (*cur).next;
            }
        }
        None
    }

    /// Split `block` so it holds exactly `need` bytes, if the remainder
    /// can host a header plus a minimum payload. The new header inherits
    /// the original's successor and free state.
    unsafe fn split(&mut self, block: *mut BlockHeader, need: usize) {
        unsafe {
            let remainder = (*block).size - need;
            if remainder < HEADER_SIZE + GRANULE {
                return;
            }
            let new_header = block.cast::<u8>().add(HEADER_SIZE + need).cast::<BlockHeader>();
            new_header.write(BlockHeader {
                size: remainder - HEADER_SIZE,
                next: (*block).next,
                free: (*block).free,
            });
            (*block).size = need;
            (*block).next = new_header;
        }
    }

    /// Free the block whose payload starts at `ptr`. `free(null)` is a
    /// no-op. Merges with the immediately-following block when that
    /// block is free; never looks backward.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by
    /// [`allocate`](Self::allocate)/[`reallocate`](Self::reallocate) on
    /// this allocator and not freed since.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: Caller guarantees `ptr` is a live payload pointer, so
        // its header sits HEADER_SIZE bytes below it.
        unsafe {
            let block = ptr.sub(HEADER_SIZE).cast::<BlockHeader>();
            (*block).free = true;

            let next = (*block).next;
            if !next.is_null() && (*next).free {
                // Absorb the neighbor: its payload plus its header.
                (*block).size += HEADER_SIZE + (*next).size;
                (*block).next = (*next).next;
            }
        }
    }

    /// Resize the allocation at `ptr` to `new_size` bytes.
    ///
    /// Null behaves as `allocate`; zero behaves as `free` and returns
    /// `None`. If the block's capacity already covers `new_size` the
    /// same pointer is returned unchanged. Otherwise the contents move
    /// to a fresh block; on allocation failure the old block is left
    /// valid and `None` is returned.
    ///
    /// # Safety
    ///
    /// Same contract on `ptr` as [`free`](Self::free).
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        if ptr.is_null() {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            // SAFETY: Caller's contract.
            unsafe { self.free(ptr) };
            return None;
        }

        // SAFETY: Caller guarantees `ptr` is a live payload pointer.
        unsafe {
            let block = ptr.sub(HEADER_SIZE).cast::<BlockHeader>();
            let capacity = (*block).size;
            if capacity >= new_size {
                return Some(NonNull::new_unchecked(ptr));
            }

            let new_ptr = self.allocate(new_size)?;
            ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), capacity.min(new_size));
            self.free(ptr);
            Some(new_ptr)
        }
    }

    /// Walk the chain and report usage counters.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            total_bytes: self.arena_size,
            allocated_bytes: 0,
            free_bytes: 0,
            largest_free_block: 0,
            blocks: 0,
        };
        let mut cur = self.base as *const BlockHeader;
        while !cur.is_null() {
            // SAFETY: Chain headers are inside the arena by invariant.
            unsafe {
                stats.blocks += 1;
                if (*cur).free {
                    stats.free_bytes += (*cur).size;
                    stats.largest_free_block = stats.largest_free_block.max((*cur).size);
                } else {
                    stats.allocated_bytes += (*cur).size;
                }
                cur = (*cur).next;
            }
        }
        stats
    }

    /// Check the header chain: address-ordered, gap-free, and covering
    /// the arena exactly. Cheap enough for tests and debug assertions.
    pub fn chain_tiles_arena(&self) -> bool {
        let arena_end = self.base as usize + self.arena_size;
        let mut cur = self.base as *const BlockHeader;
        loop {
            // SAFETY: Chain headers are inside the arena by invariant;
            // a corrupted chain is exactly what this walk detects, so
            // every step is bounds-checked before dereferencing further.
            unsafe {
                let block_end = cur as usize + HEADER_SIZE + (*cur).size;
                if block_end > arena_end {
                    return false;
                }
                let next = (*cur).next;
                if next.is_null() {
                    return block_end == arena_end;
                }
                if next as usize != block_end {
                    return false;
                }
                cur = next;
            }
        }
    }
}

/// Heap usage counters, as reported by [`FreeListAllocator::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena size, headers included.
    pub total_bytes: usize,
    /// Sum of used payload bytes.
    pub allocated_bytes: usize,
    /// Sum of free payload bytes.
    pub free_bytes: usize,
    /// Largest single free payload — the biggest allocation that can
    /// currently succeed.
    pub largest_free_block: usize,
    /// Number of blocks in the chain.
    pub blocks: usize,
}

// =============================================================================
// Global allocator
// =============================================================================

/// The allocator behind an interrupt-masking lock.
///
/// This is what backs `alloc::Vec` and friends in the kernel. Interrupts
/// are disabled for the duration of every allocator critical section, so
/// allocation from a trap handler cannot interleave with an allocation
/// on the interrupted path.
pub struct LockedHeap {
    inner: IrqSpinLock<Option<FreeListAllocator>>,
}

impl LockedHeap {
    pub const fn empty() -> Self {
        Self {
            inner: IrqSpinLock::new(None),
        }
    }

    /// Hand the arena to the allocator. Must be called exactly once,
    /// before any allocation.
    ///
    /// # Safety
    ///
    /// Same arena contract as [`FreeListAllocator::new`].
    pub unsafe fn init(&self, base: *mut u8, arena_size: usize) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.is_none());
        // SAFETY: Caller's contract.
        *inner = Some(unsafe { FreeListAllocator::new(base, arena_size) });
    }

    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.inner.lock().as_mut()?.allocate(size)
    }

    /// # Safety
    ///
    /// Same contract on `ptr` as [`FreeListAllocator::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        if let Some(allocator) = self.inner.lock().as_mut() {
            // SAFETY: Caller's contract.
            unsafe { allocator.free(ptr) };
        }
    }

    /// # Safety
    ///
    /// Same contract on `ptr` as [`FreeListAllocator::reallocate`].
    pub unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: Caller's contract.
        unsafe { self.inner.lock().as_mut()?.reallocate(ptr, new_size) }
    }

    /// Usage counters, or `None` before `init`.
    pub fn stats(&self) -> Option<HeapStats> {
        self.inner.lock().as_ref().map(FreeListAllocator::stats)
    }

    /// Arena bounds as (base address, size), or `None` before `init`.
    pub fn arena(&self) -> Option<(usize, usize)> {
        self.inner
            .lock()
            .as_ref()
            .map(|a| (a.base as usize, a.arena_size))
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Payloads are granule-aligned; stricter alignment is not
        // supported and fails like exhaustion does.
        if layout.align() > GRANULE {
            return ptr::null_mut();
        }
        self.allocate(layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // SAFETY: GlobalAlloc contract matches free's contract.
        unsafe { self.free(ptr) };
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: GlobalAlloc contract matches reallocate's contract.
        unsafe {
            self.reallocate(ptr, new_size)
                .map_or(ptr::null_mut(), NonNull::as_ptr)
        }
    }
}

// =============================================================================
// The kernel arena
// =============================================================================

/// Arena size: 4 MiB embedded in the kernel image (lands in .bss).
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

#[repr(C, align(4096))]
struct Arena(UnsafeCell<[u8; HEAP_SIZE]>);

// SAFETY: The arena bytes are only ever touched through the allocator,
// which sits behind the IrqSpinLock in ALLOCATOR.
unsafe impl Sync for Arena {}

static ARENA: Arena = Arena(UnsafeCell::new([0; HEAP_SIZE]));

/// The kernel's global allocator. Only the freestanding build registers
/// it with `#[global_allocator]`; hosted test builds keep the host's.
#[cfg_attr(target_os = "none", global_allocator)]
pub static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initialise the kernel heap over the static arena. Called once during
/// boot, before anything allocates.
pub fn init() {
    // SAFETY: ARENA is granule-aligned, lives forever, and is handed to
    // the allocator exactly once, here.
    unsafe {
        ALLOCATOR.init(ARENA.0.get().cast::<u8>(), HEAP_SIZE);
    }
    if let Some(stats) = ALLOCATOR.stats() {
        log::info!(
            "heap initialised: {} KiB arena at {:#018x}",
            stats.total_bytes / 1024,
            ARENA.0.get() as usize,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ARENA_SIZE: usize = 4096;

    #[repr(align(16))]
    struct TestArena([u8; TEST_ARENA_SIZE]);

    /// A boxed arena plus the allocator over it, so tests own their
    /// memory and the borrow checker keeps the arena alive.
    fn test_heap() -> (Box<TestArena>, FreeListAllocator) {
        let mut arena = Box::new(TestArena([0; TEST_ARENA_SIZE]));
        let allocator = unsafe { FreeListAllocator::new(arena.0.as_mut_ptr(), TEST_ARENA_SIZE) };
        (arena, allocator)
    }

    #[test]
    fn fresh_heap_is_one_free_block() {
        let (_arena, heap) = test_heap();
        let stats = heap.stats();
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.free_bytes, TEST_ARENA_SIZE - HEADER_SIZE);
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn chain_tiles_arena_across_mixed_operations() {
        let (_arena, mut heap) = test_heap();

        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        let c = heap.allocate(50).unwrap();
        assert!(heap.chain_tiles_arena());

        unsafe { heap.free(b.as_ptr()) };
        assert!(heap.chain_tiles_arena());

        let d = heap.allocate(64).unwrap();
        assert!(heap.chain_tiles_arena());

        let a2 = unsafe { heap.reallocate(a.as_ptr(), 300).unwrap() };
        assert!(heap.chain_tiles_arena());

        unsafe {
            heap.free(c.as_ptr());
            heap.free(d.as_ptr());
            heap.free(a2.as_ptr());
        }
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn distinct_live_allocations_never_alias() {
        let (_arena, mut heap) = test_heap();
        let mut live = Vec::new();
        for _ in 0..10 {
            live.push(heap.allocate(48).unwrap().as_ptr() as usize);
        }
        let mut sorted = live.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), live.len());

        // Payloads must not overlap either: 48 rounds up to 48.
        for window in sorted.windows(2) {
            assert!(window[0] + 48 <= window[1]);
        }
    }

    #[test]
    fn allocate_then_free_restores_free_capacity() {
        let (_arena, mut heap) = test_heap();
        let before = heap.stats();

        let p = heap.allocate(128).unwrap();
        unsafe { heap.free(p.as_ptr()) };

        let after = heap.stats();
        assert_eq!(after.free_bytes, before.free_bytes);
        assert_eq!(after.blocks, 1);
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn freeing_merges_with_following_free_block() {
        let (_arena, mut heap) = test_heap();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        // Keep a third block live so the tail stays pinned.
        let _c = heap.allocate(64).unwrap();

        // b's successor c is still live, so freeing b merges nothing;
        // freeing a then finds b free and absorbs it.
        unsafe { heap.free(b.as_ptr()) };
        let mid = heap.stats();
        unsafe { heap.free(a.as_ptr()) };
        let merged = heap.stats();

        assert_eq!(merged.blocks, mid.blocks - 1);
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn no_backward_coalescing_by_design() {
        let (_arena, mut heap) = test_heap();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        let _c = heap.allocate(64).unwrap();

        // Free in address order: a's successor (b) is still live at the
        // time a is freed, so the two free blocks stay separate.
        unsafe { heap.free(a.as_ptr()) };
        unsafe { heap.free(b.as_ptr()) };

        let stats = heap.stats();
        // a and b remain distinct free blocks (plus the free tail).
        assert_eq!(stats.blocks, 4);
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn first_fit_reuses_the_earliest_hole() {
        let (_arena, mut heap) = test_heap();
        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        unsafe { heap.free(a.as_ptr()) };

        // The freed first block fits → same address comes back.
        let again = heap.allocate(64).unwrap();
        assert_eq!(again.as_ptr(), a.as_ptr());
    }

    #[test]
    fn exhaustion_returns_none_and_leaves_heap_valid() {
        let (_arena, mut heap) = test_heap();
        assert!(heap.allocate(TEST_ARENA_SIZE).is_none());

        // Fill, then ask for more.
        let p = heap.allocate(TEST_ARENA_SIZE - HEADER_SIZE).unwrap();
        assert!(heap.allocate(16).is_none());
        unsafe { heap.free(p.as_ptr()) };
        assert!(heap.chain_tiles_arena());
        assert!(heap.allocate(16).is_some());
    }

    #[test]
    fn free_null_is_a_noop() {
        let (_arena, mut heap) = test_heap();
        let before = heap.stats();
        unsafe { heap.free(core::ptr::null_mut()) };
        assert_eq!(heap.stats(), before);
    }

    #[test]
    fn small_request_does_not_split_off_unusable_remainder() {
        let (_arena, mut heap) = test_heap();
        let p = heap.allocate(TEST_ARENA_SIZE - HEADER_SIZE - 16).unwrap();
        // The 16-byte remainder cannot host a header + payload, so the
        // block was handed out whole.
        let stats = heap.stats();
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.allocated_bytes, TEST_ARENA_SIZE - HEADER_SIZE);
        unsafe { heap.free(p.as_ptr()) };
    }

    #[test]
    fn reallocate_within_capacity_returns_same_pointer() {
        let (_arena, mut heap) = test_heap();
        let p = heap.allocate(256).unwrap();
        let shrunk = unsafe { heap.reallocate(p.as_ptr(), 64).unwrap() };
        assert_eq!(shrunk.as_ptr(), p.as_ptr());

        // Growing within the rounded capacity also stays in place.
        let q = heap.allocate(50).unwrap();
        let grown = unsafe { heap.reallocate(q.as_ptr(), 60).unwrap() };
        assert_eq!(grown.as_ptr(), q.as_ptr());
    }

    #[test]
    fn reallocate_grow_moves_and_copies_contents() {
        let (_arena, mut heap) = test_heap();
        let p = heap.allocate(32).unwrap();
        let _pin = heap.allocate(16).unwrap(); // block growth in place
        unsafe {
            for i in 0..32 {
                p.as_ptr().add(i).write(i as u8);
            }
            let grown = heap.reallocate(p.as_ptr(), 256).unwrap();
            assert_ne!(grown.as_ptr(), p.as_ptr());
            for i in 0..32 {
                assert_eq!(grown.as_ptr().add(i).read(), i as u8);
            }
        }
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn reallocate_null_allocates() {
        let (_arena, mut heap) = test_heap();
        let p = unsafe { heap.reallocate(core::ptr::null_mut(), 64) };
        assert!(p.is_some());
    }

    #[test]
    fn reallocate_to_zero_frees() {
        let (_arena, mut heap) = test_heap();
        let before = heap.stats();
        let p = heap.allocate(64).unwrap();
        let r = unsafe { heap.reallocate(p.as_ptr(), 0) };
        assert!(r.is_none());
        assert_eq!(heap.stats(), before);
    }

    #[test]
    fn failed_grow_leaves_old_block_valid() {
        let (_arena, mut heap) = test_heap();
        let p = heap.allocate(64).unwrap();
        unsafe {
            p.as_ptr().write(0xAB);
            // No room for 8 KiB in a 4 KiB arena.
            assert!(heap.reallocate(p.as_ptr(), 2 * TEST_ARENA_SIZE).is_none());
            assert_eq!(p.as_ptr().read(), 0xAB);
            heap.free(p.as_ptr());
        }
        assert!(heap.chain_tiles_arena());
    }

    #[test]
    fn locked_heap_reports_the_arena_it_was_initialized_with() {
        let mut arena = Box::new(TestArena([0; TEST_ARENA_SIZE]));
        let base = arena.0.as_mut_ptr();
        let heap = LockedHeap::empty();
        assert!(heap.arena().is_none());

        unsafe { heap.init(base, TEST_ARENA_SIZE) };

        assert_eq!(heap.arena(), Some((base as usize, TEST_ARENA_SIZE)));
        assert_eq!(heap.stats().unwrap().total_bytes, TEST_ARENA_SIZE);
    }

    #[test]
    fn locked_heap_rejects_oversized_alignment() {
        let mut arena = Box::new(TestArena([0; TEST_ARENA_SIZE]));
        let heap = LockedHeap::empty();
        unsafe { heap.init(arena.0.as_mut_ptr(), TEST_ARENA_SIZE) };

        let layout = Layout::from_size_align(64, 64).unwrap();
        assert!(unsafe { heap.alloc(layout) }.is_null());

        let ok = Layout::from_size_align(64, 16).unwrap();
        let p = unsafe { heap.alloc(ok) };
        assert!(!p.is_null());
        unsafe { heap.dealloc(p, ok) };
    }
}
