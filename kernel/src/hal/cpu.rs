//! CPU capability domain.

use halcyon_hw::cpu;

/// Interrupt-flag control, halting, and cycle counting.
pub trait CpuOps: Sync {
    fn interrupts_enabled(&self) -> bool;
    fn enable_interrupts(&self);
    fn disable_interrupts(&self);
    /// Halt until the next interrupt.
    fn halt(&self);
    /// A monotonically increasing cycle counter for coarse timing.
    fn timestamp(&self) -> u64;
}

/// The x86_64 backend: straight delegation to the instruction wrappers.
pub struct X86Cpu;

impl CpuOps for X86Cpu {
    fn interrupts_enabled(&self) -> bool {
        cpu::interrupts_enabled()
    }

    fn enable_interrupts(&self) {
        cpu::enable_interrupts();
    }

    fn disable_interrupts(&self) {
        cpu::disable_interrupts();
    }

    fn halt(&self) {
        cpu::halt();
    }

    fn timestamp(&self) -> u64 {
        cpu::read_tsc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_monotonic_enough() {
        let a = X86Cpu.timestamp();
        let b = X86Cpu.timestamp();
        assert!(b >= a);
    }
}
