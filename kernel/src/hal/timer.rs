//! Timer capability domain.
//!
//! The tick counter is advanced by the handler the boot sequence
//! registers on the timer vector; everything else reads it. `wait` is a
//! spin-wait that halts between checks — nothing at this layer blocks.

use core::sync::atomic::{AtomicU64, Ordering};

use halcyon_hw::cpu;
use halcyon_hw::pit::Pit;
use halcyon_hw::port::IoBus;

use crate::sync::IrqSpinLock;
use crate::traps::TrapFrame;

/// Tick counting and timer-frequency control.
pub trait TimerOps: Sync {
    /// Ticks since the timer interrupt was enabled. Monotonic.
    fn ticks(&self) -> u64;
    /// Reprogram the tick rate; returns the actual frequency in Hz
    /// after hardware divisor rounding.
    fn set_frequency(&self, hz: u32) -> u32;
    /// Spin until `ticks` more timer interrupts have arrived. Only
    /// meaningful once interrupts are enabled and the timer line is
    /// unmasked.
    fn wait(&self, ticks: u64);
}

static TICKS: AtomicU64 = AtomicU64::new(0);

// SAFETY: Ring 0; the lock serializes access to the PIT's ports.
static PIT: IrqSpinLock<Pit<IoBus>> = IrqSpinLock::new(Pit::new(unsafe { IoBus::new() }));

/// Handler for the timer vector. Registered by the boot sequence.
pub fn tick_handler(_frame: &mut TrapFrame) {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Backend over channel 0 of the 8254 PIT.
pub struct PitBacked;

impl TimerOps for PitBacked {
    fn ticks(&self) -> u64 {
        TICKS.load(Ordering::Relaxed)
    }

    fn set_frequency(&self, hz: u32) -> u32 {
        PIT.lock().set_frequency(hz)
    }

    fn wait(&self, ticks: u64) {
        let deadline = self.ticks().saturating_add(ticks);
        while self.ticks() < deadline {
            cpu::halt();
        }
    }
}
