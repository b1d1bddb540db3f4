//! Kernel panic handler.
//!
//! Fatal conditions (unhandled exceptions, broken invariants) end up
//! here. The panic may have fired while a log record held the serial
//! lock, so the handler breaks that lock before reporting — interrupts
//! are off and this path never returns, so the previous holder can
//! never resume into the port. The report goes out through the logger
//! and as a raw banner, then the CPU parks for good. Hosted test builds
//! use the host's panic machinery.

#[cfg(target_os = "none")]
use core::panic::PanicInfo;

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    halcyon_hw::cpu::disable_interrupts();

    // SAFETY: Interrupts are disabled and this function never returns,
    // so whoever held the serial lock when the panic fired can never
    // resume; breaking the lock cannot create a second writer.
    unsafe { halcyon_hw::serial::force_unlock() };

    log::error!("kernel panic: {info}");
    halcyon_log::kprintln!("\n*** KERNEL PANIC ***\n{info}");

    halcyon_hw::cpu::halt_forever();
}
