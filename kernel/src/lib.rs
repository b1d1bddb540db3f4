//! Halcyon kernel library.
//!
//! The control plane of a small freestanding x86_64 kernel: descriptor
//! tables, the trap/interrupt subsystem, the heap allocator, and the HAL
//! capability layer. The binary half (`main.rs`) drives the boot
//! sequence; everything here is also buildable on hosted targets so the
//! unit tests can exercise the pure logic.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Architecture-specific code: descriptor tables, trap stubs, boot
/// protocol. Currently x86_64 only.
pub mod arch;

/// Boot-time kernel context: explicit ownership of the singleton
/// subsystems, threaded into kernel logic instead of ambient globals.
pub mod context;

/// HAL capability tables: cpu, interrupt, memory, timer, platform.
pub mod hal;

/// Memory management: the first-fit free-list heap allocator.
pub mod memory;

/// Synchronization primitives.
pub mod sync;

/// Trap and interrupt dispatch: the vector → handler registry.
pub mod traps;

/// Kernel utilities: the panic handler.
pub mod util;
