//! Ticket spinlock that masks interrupts while held.
//!
//! A plain spinlock is not enough in a kernel: if the main flow holds a
//! lock and an interrupt handler on the same CPU tries to take it, the
//! handler spins forever — the holder cannot release until the handler
//! returns. So `lock()` saves the interrupt flag and disables interrupts
//! before acquiring, and the guard restores the saved flag on drop.
//! Nested lock/unlock pairs therefore compose correctly.
//!
//! The ticket mechanism (FIFO by ticket number) is overkill for a
//! single hardware thread but keeps the lock correct if cores are ever
//! added; its state is two counters in one cache line.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use halcyon_hw::cpu;

/// A ticket-based spinlock that disables interrupts while held.
pub struct IrqSpinLock<T> {
    /// The next ticket to be dispensed.
    next_ticket: AtomicU32,
    /// The ticket number currently being served.
    now_serving: AtomicU32,
    /// The protected data; the lock ensures exclusive access at runtime.
    data: UnsafeCell<T>,
}

// SAFETY: The lock hands out access to the inner T to one holder at a
// time, so sharing the lock is as safe as sending the T.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new, unlocked spinlock. `const` so it can back statics.
    pub const fn new(value: T) -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, disabling interrupts on this CPU first.
    ///
    /// The previous interrupt state is restored when the returned guard
    /// is dropped.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let irq_was_enabled = cpu::save_and_disable_interrupts();

        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        // Acquire pairs with the Release in unlock: we observe every
        // write made by the previous holder before touching the data.
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            core::hint::spin_loop();
        }

        IrqSpinLockGuard {
            lock: self,
            irq_was_enabled,
        }
    }
}

/// RAII guard: releases the lock and restores the interrupt flag on drop.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    irq_was_enabled: bool,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Holding the guard means holding the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Holding the guard means holding the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Release the lock before re-enabling interrupts: a handler that
        // fires in between must be able to acquire it.
        self.lock.now_serving.fetch_add(1, Ordering::Release);
        cpu::restore_interrupts(self.irq_was_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_provides_mutable_access() {
        let lock = IrqSpinLock::new(41u64);
        *lock.lock() += 1;
        assert_eq!(*lock.lock(), 42);
    }

    #[test]
    fn sequential_reacquisition_works() {
        let lock = IrqSpinLock::new(Vec::new());
        for i in 0..8 {
            lock.lock().push(i);
        }
        assert_eq!(lock.lock().len(), 8);
    }
}
