//! Serial UART driver (16550, COM1).
//!
//! The simplest and most reliable output device on x86: it needs no
//! memory allocation, no interrupts (we poll the status register), and
//! no descriptor tables, so it works from the very first instruction of
//! `kmain`. All kernel logging drains here.
//!
//! Configured for 115200 baud, 8 data bits, no parity, 1 stop bit — the
//! standard setup understood by QEMU (`-serial stdio`) and serial
//! capture tools.

use crate::cpu;
use crate::port::{inb, outb};
use bitflags::bitflags;
use core::fmt;
use spin::Mutex;

/// Base I/O port for COM1. Standardized on all x86 PCs.
const COM1_BASE: u16 = 0x3F8;

// Register offsets from the base port (16550 layout). With DLAB set in
// the line control register, +0/+1 become the baud divisor latch.
const DATA_REG: u16 = 0; // +0: TX/RX data
const INT_ENABLE_REG: u16 = 1; // +1: interrupt enable
const FIFO_CTRL_REG: u16 = 2; // +2: FIFO control
const LINE_CTRL_REG: u16 = 3; // +3: data bits, parity, stop bits, DLAB
const MODEM_CTRL_REG: u16 = 4; // +4: DTR, RTS, loopback
const LINE_STATUS_REG: u16 = 5; // +5: TX empty, RX ready, errors

bitflags! {
    /// Line Status Register bits.
    struct LineStatus: u8 {
        /// A received byte is waiting in the data register.
        const RX_READY = 1 << 0;
        /// The transmit holding register is empty.
        const TX_EMPTY = 1 << 5;
    }
}

/// The global serial port, protected by a spinlock.
///
/// Access it through [`with_port`], which also masks interrupts for the
/// duration — a trap handler that logs while the main flow holds this
/// lock would otherwise deadlock the single CPU.
static SERIAL: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1_BASE));

/// Runs `f` with exclusive access to the serial port, interrupts masked.
pub fn with_port<R>(f: impl FnOnce(&mut SerialPort) -> R) -> R {
    let was_enabled = cpu::save_and_disable_interrupts();
    let result = f(&mut SERIAL.lock());
    cpu::restore_interrupts(was_enabled);
    result
}

/// Initializes the COM1 UART. Call once, before any output.
pub fn init() {
    with_port(|port| port.init());
}

/// Forcibly releases the serial lock.
///
/// For the panic path only. A panic raised mid-record holds the serial
/// lock; the panic handler's own report would then spin on it forever
/// with interrupts disabled. Breaking the lock first lets the report
/// get out.
///
/// # Safety
///
/// The previous holder must never resume — the caller must be running
/// with interrupts disabled on a path that does not return. Otherwise
/// two writers race on the port.
pub unsafe fn force_unlock() {
    // SAFETY: Caller's contract.
    unsafe { SERIAL.force_unlock() };
}

/// A 16550 UART at a fixed I/O port base.
///
/// On hosted targets (unit tests) the port accesses compile out and
/// writes are discarded; only the freestanding kernel touches hardware.
pub struct SerialPort {
    base: u16,
}

impl SerialPort {
    /// Creates a handle at the given base I/O port. Does not touch
    /// hardware — call [`SerialPort::init`] to configure the UART.
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    /// Configures the UART: 115200 baud, 8N1, FIFOs enabled.
    pub fn init(&mut self) {
        #[cfg(target_os = "none")]
        // SAFETY: These are the documented 16550 registers at a standard
        // COM1 base; we are in ring 0 during boot.
        unsafe {
            outb(self.base + INT_ENABLE_REG, 0x00); // no UART interrupts, we poll
            outb(self.base + LINE_CTRL_REG, 0x80); // DLAB on
            outb(self.base + DATA_REG, 0x01); // divisor low: 115200 baud
            outb(self.base + INT_ENABLE_REG, 0x00); // divisor high
            outb(self.base + LINE_CTRL_REG, 0x03); // DLAB off, 8N1
            outb(self.base + FIFO_CTRL_REG, 0xC7); // FIFOs on, cleared, 14-byte threshold
            outb(self.base + MODEM_CTRL_REG, 0x0B); // DTR + RTS + OUT2
        }
    }

    /// Writes one byte, polling until the transmitter is ready.
    pub fn write_byte(&mut self, byte: u8) {
        #[cfg(target_os = "none")]
        // SAFETY: Reads/writes of the documented 16550 registers.
        unsafe {
            while !LineStatus::from_bits_truncate(inb(self.base + LINE_STATUS_REG))
                .contains(LineStatus::TX_EMPTY)
            {
                core::hint::spin_loop();
            }
            outb(self.base + DATA_REG, byte);
        }
        #[cfg(not(target_os = "none"))]
        let _ = byte;
    }

    /// Reads one byte if the receiver has one waiting.
    pub fn read_byte(&mut self) -> Option<u8> {
        #[cfg(target_os = "none")]
        // SAFETY: Reads of the documented 16550 registers.
        unsafe {
            if LineStatus::from_bits_truncate(inb(self.base + LINE_STATUS_REG))
                .contains(LineStatus::RX_READY)
            {
                return Some(inb(self.base + DATA_REG));
            }
        }
        None
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            // Serial consoles expect CRLF line endings.
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn force_unlock_recovers_a_lock_whose_holder_never_resumes() {
        // Simulate a writer that died mid-record: take the lock and
        // leak the guard, as a panic inside the closure would.
        core::mem::forget(SERIAL.lock());

        // SAFETY: The leaked guard's holder is gone for good.
        unsafe { force_unlock() };

        // The port is usable again; without the force this would spin
        // forever.
        with_port(|port| writeln!(port, "recovered").unwrap());
    }
}
