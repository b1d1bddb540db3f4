//! The kernel context: explicit handles to the boot-created singletons.
//!
//! Instead of every subsystem reaching for ambient globals, the boot
//! sequence builds one `KernelContext` and threads it into whatever
//! kernel logic runs afterward. Single-instance semantics are kept (the
//! referents are the boot statics), but ownership is visible and a
//! hosted test can assemble a context around its own fixtures.

use crate::hal::Hal;
use crate::memory::LockedHeap;
use crate::traps::TrapRegistry;

/// Handles to the kernel's singleton subsystems, fixed at boot.
pub struct KernelContext {
    pub hal: &'static Hal,
    pub heap: &'static LockedHeap,
    pub traps: &'static TrapRegistry,
}

impl KernelContext {
    /// Assembles the context after the boot sequence has initialised
    /// every referent.
    pub fn new(hal: &'static Hal) -> Self {
        Self {
            hal,
            heap: &crate::memory::heap::ALLOCATOR,
            traps: &crate::traps::TRAPS,
        }
    }

    /// The idle loop: halt until an interrupt arrives, service it,
    /// halt again. All post-boot work happens in handlers.
    pub fn idle_loop(&self) -> ! {
        loop {
            self.hal.cpu.halt();
        }
    }
}
