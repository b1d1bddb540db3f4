//! Legacy 8259 PIC (Programmable Interrupt Controller) driver.
//!
//! Two chained 8259 chips route the 16 hardware interrupt lines to the
//! CPU: the master owns IRQ 0-7, the slave (cascaded through IRQ 2) owns
//! IRQ 8-15. At power-on the master delivers IRQ 0-7 on vectors 8-15,
//! colliding with CPU exception vectors, so the first thing the kernel
//! does with the PIC is remap it: IRQ 0 → vector 32, IRQ 8 → vector 40.
//!
//! The driver is generic over [`PortBus`] so the exact command byte
//! sequences (remap, end-of-interrupt, masking) can be verified with a
//! recording bus in unit tests.

use crate::port::PortBus;
use bitflags::bitflags;

/// Master PIC command/status port.
const MASTER_COMMAND: u16 = 0x20;
/// Master PIC data port (ICW2-4, interrupt mask register).
const MASTER_DATA: u16 = 0x21;
/// Slave PIC command/status port.
const SLAVE_COMMAND: u16 = 0xA0;
/// Slave PIC data port.
const SLAVE_DATA: u16 = 0xA1;

bitflags! {
    /// Initialization Command Word 1 bits.
    struct Icw1: u8 {
        /// Begin the initialization sequence.
        const INIT = 0x10;
        /// ICW4 will be sent.
        const ICW4 = 0x01;
    }
}

/// ICW3 for the master: a slave hangs off IRQ 2 (bit mask).
const ICW3_MASTER_HAS_SLAVE_ON_IRQ2: u8 = 1 << 2;
/// ICW3 for the slave: its cascade identity is IRQ 2.
const ICW3_SLAVE_ID: u8 = 2;
/// ICW4: 8086/88 mode (as opposed to MCS-80/85 mode).
const ICW4_8086: u8 = 0x01;
/// End-of-interrupt command.
const EOI: u8 = 0x20;

/// Vector base for the master PIC after remapping (IRQ 0-7 → 32-39).
pub const MASTER_OFFSET: u8 = 32;
/// Vector base for the slave PIC after remapping (IRQ 8-15 → 40-47).
pub const SLAVE_OFFSET: u8 = 40;
/// Number of hardware interrupt lines across both controllers.
pub const NUM_LINES: u8 = 16;

/// A hardware interrupt line outside 0-15 was named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLine(pub u8);

impl core::fmt::Display for InvalidLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "hardware interrupt line {} outside 0-15", self.0)
    }
}

/// The chained master/slave 8259 pair.
pub struct ChainedPics<B: PortBus> {
    bus: B,
}

impl<B: PortBus> ChainedPics<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Returns whether `vector` belongs to a remapped hardware line.
    pub const fn handles(vector: u8) -> bool {
        vector >= MASTER_OFFSET && vector < SLAVE_OFFSET + 8
    }

    /// Remap both controllers so hardware lines land on vectors 32-47,
    /// then mask every line.
    ///
    /// Issues the full four-byte initialization sequence (ICW1-ICW4) to
    /// master and slave, with an I/O delay between writes for old
    /// hardware. Must run with interrupts disabled and must complete
    /// before any line is unmasked — an un-remapped line fires into an
    /// exception vector and is misread as a CPU fault. The boot sequence
    /// enforces this ordering.
    pub fn remap(&mut self) {
        let icw1 = (Icw1::INIT | Icw1::ICW4).bits();

        // ICW1: begin initialization (cascade mode, ICW4 needed).
        self.bus.write(MASTER_COMMAND, icw1);
        self.bus.wait();
        self.bus.write(SLAVE_COMMAND, icw1);
        self.bus.wait();

        // ICW2: vector base offsets.
        self.bus.write(MASTER_DATA, MASTER_OFFSET);
        self.bus.wait();
        self.bus.write(SLAVE_DATA, SLAVE_OFFSET);
        self.bus.wait();

        // ICW3: wire up the cascade.
        self.bus.write(MASTER_DATA, ICW3_MASTER_HAS_SLAVE_ON_IRQ2);
        self.bus.wait();
        self.bus.write(SLAVE_DATA, ICW3_SLAVE_ID);
        self.bus.wait();

        // ICW4: 8086 mode.
        self.bus.write(MASTER_DATA, ICW4_8086);
        self.bus.wait();
        self.bus.write(SLAVE_DATA, ICW4_8086);
        self.bus.wait();

        // Mask every line; subsystems unmask what they service.
        self.bus.write(MASTER_DATA, 0xFF);
        self.bus.write(SLAVE_DATA, 0xFF);
    }

    /// Send end-of-interrupt for the given vector.
    ///
    /// The master is acknowledged for every hardware line; the slave is
    /// acknowledged first when the line is slave-owned (vector ≥ 40).
    /// Skipping this blocks all further interrupts on that controller.
    /// Vectors outside 32-47 are ignored.
    pub fn acknowledge(&mut self, vector: u8) {
        if !Self::handles(vector) {
            return;
        }
        if vector >= SLAVE_OFFSET {
            self.bus.write(SLAVE_COMMAND, EOI);
        }
        self.bus.write(MASTER_COMMAND, EOI);
    }

    /// Mask (disable) one hardware interrupt line.
    pub fn mask(&mut self, line: u8) -> Result<(), InvalidLine> {
        let (port, bit) = Self::mask_register(line)?;
        let current = self.bus.read(port);
        self.bus.write(port, current | (1 << bit));
        Ok(())
    }

    /// Unmask (enable) one hardware interrupt line.
    pub fn unmask(&mut self, line: u8) -> Result<(), InvalidLine> {
        let (port, bit) = Self::mask_register(line)?;
        let current = self.bus.read(port);
        self.bus.write(port, current & !(1 << bit));
        Ok(())
    }

    fn mask_register(line: u8) -> Result<(u16, u8), InvalidLine> {
        match line {
            0..=7 => Ok((MASTER_DATA, line)),
            8..=15 => Ok((SLAVE_DATA, line - 8)),
            other => Err(InvalidLine(other)),
        }
    }
}
