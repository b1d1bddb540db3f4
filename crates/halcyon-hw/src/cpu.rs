//! Low-level CPU operations.
//!
//! Thin wrappers around privileged x86_64 instructions: interrupt flag
//! control, halting, the timestamp counter, model-specific registers, and
//! the fault-address register. These are the "bottom" of the abstraction
//! stack — higher-level code (HAL backends, spinlocks, the trap subsystem)
//! calls them and they do nothing but execute the instruction.
//!
//! `cli`/`sti`/`hlt` are privileged, so on hosted targets (where the unit
//! tests run) they compile to no-ops and the interrupt flag reads as
//! clear. Only the freestanding kernel runs with interrupts.

/// Returns whether interrupts are currently enabled on this CPU.
#[inline]
pub fn interrupts_enabled() -> bool {
    #[cfg(target_os = "none")]
    {
        x86_64::instructions::interrupts::are_enabled()
    }
    #[cfg(not(target_os = "none"))]
    {
        false
    }
}

/// Enable hardware interrupts (`sti`).
#[inline]
pub fn enable_interrupts() {
    #[cfg(target_os = "none")]
    x86_64::instructions::interrupts::enable();
}

/// Disable hardware interrupts (`cli`).
#[inline]
pub fn disable_interrupts() {
    #[cfg(target_os = "none")]
    x86_64::instructions::interrupts::disable();
}

/// Disable interrupts and return whether they were enabled before.
///
/// Pair with [`restore_interrupts`] so nested critical sections put the
/// interrupt flag back exactly as they found it.
#[inline]
pub fn save_and_disable_interrupts() -> bool {
    let was_enabled = interrupts_enabled();
    disable_interrupts();
    was_enabled
}

/// Restore the interrupt flag saved by [`save_and_disable_interrupts`].
#[inline]
pub fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        enable_interrupts();
    }
}

/// Halts the CPU until the next interrupt arrives.
///
/// This is the kernel's idle instruction. Interrupts must be enabled
/// before calling it, or the CPU never wakes up.
#[inline]
pub fn halt() {
    #[cfg(target_os = "none")]
    x86_64::instructions::hlt();
    #[cfg(not(target_os = "none"))]
    core::hint::spin_loop();
}

/// Halts the CPU in an unrecoverable state.
///
/// Disables interrupts and then halts, forever. Used for fatal errors
/// (unhandled faults, panic) where continuing would be unsafe.
pub fn halt_forever() -> ! {
    loop {
        disable_interrupts();
        halt();
    }
}

/// Reads the Time Stamp Counter.
///
/// A 64-bit counter incrementing at a fixed rate on modern CPUs; used
/// for coarse boot-time measurements.
#[inline]
pub fn read_tsc() -> u64 {
    let low: u32;
    let high: u32;
    // SAFETY: RDTSC is available on all x86_64 CPUs and has no side
    // effects. It returns the 64-bit TSC in EDX:EAX.
    unsafe {
        core::arch::asm!(
            "rdtsc",
            out("eax") low,
            out("edx") high,
            options(nomem, nostack)
        );
    }
    ((high as u64) << 32) | (low as u64)
}

/// Reads a Model-Specific Register.
///
/// # Safety
///
/// The MSR index must be valid for this CPU model; reading an invalid
/// MSR raises a general protection fault. Ring 0 only.
#[inline]
pub unsafe fn read_msr(msr: u32) -> u64 {
    let low: u32;
    let high: u32;
    unsafe {
        core::arch::asm!(
            "rdmsr",
            in("ecx") msr,
            out("eax") low,
            out("edx") high,
            options(nomem, nostack)
        );
    }
    ((high as u64) << 32) | (low as u64)
}

/// Writes a value to a Model-Specific Register.
///
/// # Safety
///
/// The MSR index must be valid and the value appropriate for that MSR;
/// incorrect values can take down the system. Ring 0 only.
#[inline]
pub unsafe fn write_msr(msr: u32, value: u64) {
    let low = value as u32;
    let high = (value >> 32) as u32;
    unsafe {
        core::arch::asm!(
            "wrmsr",
            in("ecx") msr,
            in("eax") low,
            in("edx") high,
            options(nomem, nostack)
        );
    }
}

/// Reads the CR2 register: the linear address that caused the most
/// recent page fault. Only meaningful inside a page fault handler.
#[inline]
pub fn read_cr2() -> u64 {
    let value: u64;
    // SAFETY: Reading CR2 has no side effects; it returns the value the
    // CPU stored during the last page fault.
    unsafe {
        core::arch::asm!(
            "mov {}, cr2",
            out(reg) value,
            options(nomem, nostack, preserves_flags)
        );
    }
    value
}
