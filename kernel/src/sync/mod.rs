//! Kernel synchronization primitives.
//!
//! There is a single hardware thread of control in this kernel; the only
//! concurrency hazard is interrupt reentrancy. The spinlock here masks
//! interrupts while held, which is what makes the heap and the PIC
//! driver safe to touch from both the main flow and trap handlers.

pub mod spinlock;

pub use spinlock::{IrqSpinLock, IrqSpinLockGuard};
