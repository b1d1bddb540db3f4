//! Halcyon kernel entry point.
//!
//! Limine drops us here with interrupts disabled, a higher-half mapping
//! in place, and the request responses filled in. The boot sequence is
//! strictly ordered:
//!
//!   serial → logger → heap → GDT → IDT build → PIC remap → IDT load
//!   → HAL detection → timer handler + unmask → interrupts on → idle
//!
//! Descriptor tables are always built before they are loaded and the
//! PIC is remapped before any gate can fire; reordering these steps is
//! undefined behavior by the hardware's rules, not just ours.
//!
//! On hosted targets this file is an empty shell; the library half is
//! what the unit tests exercise.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod kernel_entry {
    use halcyon_hw::cpu;
    use halcyon_kernel::arch::boot;
    use halcyon_kernel::context::KernelContext;
    use halcyon_kernel::{hal, memory, traps};
    use log::{debug, info, warn};

    /// Timer tick rate programmed at boot.
    const TIMER_HZ: u32 = 100;

    #[unsafe(no_mangle)]
    extern "C" fn kmain() -> ! {
        let boot_start = cpu::read_tsc();

        halcyon_hw::serial::init();
        // Nothing useful to do if a logger is somehow already installed.
        let _ = halcyon_log::init(log::LevelFilter::Debug);
        halcyon_log::kprintln!("\nHalcyon {}", env!("CARGO_PKG_VERSION"));

        if let Some((name, version)) = boot::bootloader_info() {
            info!("booted by {name} {version}");
        }
        info!(
            "usable memory: {} MiB across {} map entries",
            boot::usable_memory() / (1024 * 1024),
            boot::memory_map().len()
        );

        memory::heap::init();

        cpu::disable_interrupts();
        if let Err(err) = traps::init() {
            panic!("trap subsystem setup failed: {err}");
        }

        let hal = hal::detect();

        if let Err(err) = hal.interrupt.install(traps::TIMER_VECTOR, hal::timer::tick_handler) {
            panic!("timer handler installation failed: {err}");
        }
        let actual_hz = hal.timer.set_frequency(TIMER_HZ);
        info!("timer programmed at {actual_hz} Hz");
        if let Err(err) = hal.interrupt.enable_line(0) {
            warn!("could not unmask timer line: {err}");
        }

        cpu::enable_interrupts();

        // APIC base is logged for bring-up diagnostics even though the
        // kernel drives the legacy PIC.
        // SAFETY: IA32_APIC_BASE exists on every x86_64 CPU.
        let apic_base = unsafe { cpu::read_msr(0x1B) };
        debug!("IA32_APIC_BASE: {apic_base:#x}");

        self_test(hal);

        info!(
            "boot complete on {} in ~{}M cycles",
            hal.platform.name(),
            (cpu::read_tsc() - boot_start) / 1_000_000
        );

        KernelContext::new(hal).idle_loop()
    }

    /// Quick end-to-end checks of the freshly initialised subsystems:
    /// a breakpoint proves the whole trap path (gate → stub → dispatch
    /// → handler → iretq), an allocation proves the heap, and a timer
    /// wait proves ticks are flowing.
    fn self_test(hal: &'static hal::Hal) {
        // Vector 3 has a resumable default handler.
        x86_64::instructions::interrupts::int3();

        let mut numbers = alloc::vec::Vec::new();
        for i in 0..64u64 {
            numbers.push(i * i);
        }
        assert_eq!(numbers.iter().sum::<u64>(), 85_344);
        if let Some(stats) = hal.memory.stats() {
            debug!(
                "heap after self-test: {} blocks, {} bytes free",
                stats.blocks, stats.free_bytes
            );
        }

        hal.timer.wait(2);
        debug!("self-test passed, {} ticks observed", hal.timer.ticks());
    }

    extern crate alloc;
}

#[cfg(not(target_os = "none"))]
fn main() {}
