//! Default exception handlers installed at boot.
//!
//! Only a handful of faults get handlers; everything else hits the
//! unhandled-exception path in dispatch, which is fatal by policy.

use halcyon_hw::cpu;
use log::info;

use crate::traps::dispatch::{TrapError, TrapRegistry};
use crate::traps::frame::TrapFrame;

const BREAKPOINT: u8 = 3;
const DOUBLE_FAULT: u8 = 8;
const GENERAL_PROTECTION_FAULT: u8 = 13;
const PAGE_FAULT: u8 = 14;

/// Breakpoint is the one exception the kernel resumes from; `int3` is
/// how the boot path proves the whole trap plumbing works.
fn breakpoint(frame: &mut TrapFrame) {
    info!("breakpoint at {:#018x}", frame.rip);
}

fn double_fault(frame: &mut TrapFrame) {
    panic!("double fault\n{frame}");
}

fn general_protection_fault(frame: &mut TrapFrame) {
    panic!("general protection fault\n{frame}");
}

fn page_fault(frame: &mut TrapFrame) {
    // CR2 holds the faulting linear address. With no paging subsystem
    // there is nothing to demand-map, so every page fault is fatal.
    let address = cpu::read_cr2();
    panic!("page fault accessing {address:#018x}\n{frame}");
}

/// Registers the default exception handlers.
pub fn install_defaults(registry: &TrapRegistry) -> Result<(), TrapError> {
    registry.register(BREAKPOINT, breakpoint)?;
    registry.register(DOUBLE_FAULT, double_fault)?;
    registry.register(GENERAL_PROTECTION_FAULT, general_protection_fault)?;
    registry.register(PAGE_FAULT, page_fault)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_install_once_and_only_once() {
        let registry = TrapRegistry::new();
        install_defaults(&registry).unwrap();
        assert_eq!(
            install_defaults(&registry),
            Err(TrapError::AlreadyRegistered { vector: BREAKPOINT })
        );
    }
}
