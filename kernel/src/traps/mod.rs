//! Trap (interrupt and exception) subsystem.
//!
//! Owns the descriptor tables, the PIC pair, and the handler registry,
//! and enforces the one ordering that matters at boot: interrupts are
//! disabled, the GDT is built and loaded, the IDT is built, the PIC is
//! remapped, and only then is the IDT loaded. A table is never loaded
//! before it is built, and no hardware line can fire un-remapped.

pub mod dispatch;
pub mod frame;
pub mod handlers;

pub use dispatch::{TrapError, TrapHandler, TrapRegistry};
pub use frame::TrapFrame;

use halcyon_hw::cpu;
use halcyon_hw::pic::ChainedPics;
use halcyon_hw::port::IoBus;
use log::debug;
use spin::Once;

use crate::arch::{gdt, idt, stubs};
use crate::sync::IrqSpinLock;

/// Vector of the timer line (IRQ 0) after remapping.
pub const TIMER_VECTOR: u8 = 32;
/// Software interrupt gate reachable from ring 3.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// The kernel-wide handler registry.
pub static TRAPS: TrapRegistry = TrapRegistry::new();

/// The PIC pair, shared between dispatch (acknowledge) and the HAL
/// interrupt backend (mask/unmask).
// SAFETY: The kernel runs in ring 0 and this lock is the single point
// of access to the controllers' ports.
pub static PICS: IrqSpinLock<ChainedPics<IoBus>> =
    IrqSpinLock::new(ChainedPics::new(unsafe { IoBus::new() }));

static GDT: Once<(gdt::Gdt, gdt::Selectors)> = Once::new();
static IDT: Once<idt::Idt> = Once::new();

fn build_idt() -> idt::Idt {
    let selectors = gdt::Selectors::new();
    let mut table = idt::Idt::new();
    for vector in 0..=47u8 {
        if let Some(stub) = stubs::stub_for(vector) {
            table.install(vector, stub, selectors.kernel_code);
        }
    }
    if let Some(stub) = stubs::stub_for(SYSCALL_VECTOR) {
        table.install_user(SYSCALL_VECTOR, stub, selectors.kernel_code);
    }
    table
}

/// Brings up the whole trap subsystem.
///
/// Must be called exactly once, with interrupts disabled; interrupts
/// stay disabled on return and the caller decides when to enable them.
pub fn init() -> Result<(), TrapError> {
    assert!(
        !cpu::interrupts_enabled(),
        "trap setup requires interrupts disabled"
    );

    let (gdt_table, selectors) = GDT.call_once(|| (gdt::Gdt::new(), gdt::Selectors::new()));
    // SAFETY: The table lives in a static Once, so it satisfies the
    // 'static requirement, and interrupts are disabled.
    unsafe { gdt_table.load(selectors) };
    debug!("GDT loaded, kernel cs={:#x}", selectors.kernel_code);

    let idt_table = IDT.call_once(build_idt);

    // Remap before the IDT goes live so a spurious line cannot arrive
    // on an exception vector.
    PICS.lock().remap();
    debug!("PIC remapped, all lines masked");

    // SAFETY: Every present gate points at a trampoline from stub_for.
    unsafe { idt_table.load() };
    debug!("IDT loaded");

    handlers::install_defaults(&TRAPS)
}

/// Common entry point called by every trampoline with the saved frame.
pub extern "C" fn trap_entry(frame: &mut TrapFrame) {
    TRAPS.service(&PICS, frame);
}
