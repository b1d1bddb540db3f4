//! Interrupt capability domain.
//!
//! Wraps the handler registry and the PIC mask registers behind one
//! interface so device code never touches either directly.

use halcyon_hw::pic::InvalidLine;

use crate::traps::{self, TrapError, TrapHandler};

/// Handler installation and hardware-line gating.
pub trait InterruptOps: Sync {
    /// Installs a handler for a vector. Fails if the vector is taken.
    fn install(&self, vector: u8, handler: TrapHandler) -> Result<(), TrapError>;
    /// Removes a vector's handler; a vacant vector is a no-op.
    fn remove(&self, vector: u8);
    /// Unmasks a hardware interrupt line (0-15).
    fn enable_line(&self, line: u8) -> Result<(), InvalidLine>;
    /// Masks a hardware interrupt line (0-15).
    fn disable_line(&self, line: u8) -> Result<(), InvalidLine>;
}

/// Backend over the global registry and the 8259 pair.
pub struct PicBacked;

impl InterruptOps for PicBacked {
    fn install(&self, vector: u8, handler: TrapHandler) -> Result<(), TrapError> {
        traps::TRAPS.register(vector, handler)
    }

    fn remove(&self, vector: u8) {
        traps::TRAPS.unregister(vector);
    }

    fn enable_line(&self, line: u8) -> Result<(), InvalidLine> {
        traps::PICS.lock().unmask(line)
    }

    fn disable_line(&self, line: u8) -> Result<(), InvalidLine> {
        traps::PICS.lock().mask(line)
    }
}
