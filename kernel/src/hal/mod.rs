//! Hardware Abstraction Layer.
//!
//! Five capability domains — CPU, interrupt, memory, timer, platform —
//! each defined by a trait and served by exactly one backend bound at
//! [`detect`] time. Kernel logic calls through the [`Hal`] handle and
//! never names a concrete backend; the backends call down into the
//! drivers and the trap subsystem.
//!
//! Detection runs once. The resulting capability table is immutable for
//! the rest of execution; there is no re-detection and no backend
//! switching after boot.

pub mod cpu;
pub mod interrupt;
pub mod memory;
pub mod platform;
pub mod timer;

pub use cpu::CpuOps;
pub use interrupt::InterruptOps;
pub use memory::MemoryOps;
pub use platform::PlatformOps;
pub use timer::TimerOps;

use log::info;
use spin::Once;

/// One immutable backend reference per capability domain.
pub struct Hal {
    pub cpu: &'static dyn CpuOps,
    pub interrupt: &'static dyn InterruptOps,
    pub memory: &'static dyn MemoryOps,
    pub timer: &'static dyn TimerOps,
    pub platform: &'static dyn PlatformOps,
}

static HAL: Once<Hal> = Once::new();

/// Probes the hardware and binds every capability domain to a backend.
///
/// Every domain always resolves: the platform domain falls back to a
/// generic backend when vendor identification is inconclusive, and the
/// other four have exactly one x86_64 implementation. Idempotent —
/// later calls return the table built by the first.
pub fn detect() -> &'static Hal {
    HAL.call_once(|| {
        let platform = platform::detect();
        info!("HAL bound, platform: {}", platform.name());
        Hal {
            cpu: &cpu::X86Cpu,
            interrupt: &interrupt::PicBacked,
            memory: &memory::ArenaMemory,
            timer: &timer::PitBacked,
            platform,
        }
    })
}

/// The bound capability table.
///
/// # Panics
///
/// Panics if called before [`detect`]; the boot sequence runs detection
/// before handing control to anything that uses the HAL.
pub fn get() -> &'static Hal {
    HAL.get().expect("HAL queried before detection")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_binds_every_domain() {
        let hal = detect();
        assert!(!hal.platform.name().is_empty());
        // The CPU domain answers basic queries without faulting.
        let _ = hal.cpu.interrupts_enabled();
        // The memory domain reflects the (uninitialised) global heap.
        let _ = hal.memory.stats();
    }

    #[test]
    fn detection_is_idempotent() {
        let first = detect() as *const Hal;
        let second = detect() as *const Hal;
        assert_eq!(first, second);
        assert_eq!(get() as *const Hal, first);
    }
}
