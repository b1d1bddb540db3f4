//! x86 port I/O primitives.
//!
//! Provides `inb` and `outb` wrappers over inline assembly, plus the
//! [`PortBus`] trait that the device drivers (PIC, PIT) are written
//! against. The real bus is [`IoBus`]; tests substitute a recording mock.

/// Write a byte to an x86 I/O port.
///
/// # Safety
///
/// Writing to an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port and value are valid, and must be
/// running in ring 0.
#[inline]
pub unsafe fn outb(port: u16, value: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack, preserves_flags)
        );
    }
}

/// Read a byte from an x86 I/O port.
///
/// # Safety
///
/// Reading from an arbitrary I/O port can have side effects on hardware.
/// The caller must ensure the port is valid, and must be running in ring 0.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    unsafe {
        core::arch::asm!(
            "in al, dx",
            in("dx") port,
            out("al") value,
            options(nomem, nostack, preserves_flags)
        );
    }
    value
}

/// Port used for the short I/O delay some controllers need between
/// command bytes. Writes to it are discarded by the hardware.
pub const WAIT_PORT: u16 = 0x80;

/// Byte-granular access to the I/O port space.
///
/// The boot-critical device drivers take a `PortBus` instead of calling
/// `inb`/`outb` directly. On hardware the implementation is [`IoBus`];
/// unit tests use a mock that records the exact (port, byte) sequence a
/// driver emits, which is how the controller protocols are verified
/// without a machine to run on.
pub trait PortBus {
    fn read(&mut self, port: u16) -> u8;
    fn write(&mut self, port: u16, value: u8);

    /// Short I/O delay between controller commands.
    fn wait(&mut self) {
        self.write(WAIT_PORT, 0);
    }
}

/// The real I/O port bus.
pub struct IoBus(());

impl IoBus {
    /// Create a handle to the I/O port space.
    ///
    /// # Safety
    ///
    /// The caller must be running in ring 0; port instructions fault
    /// otherwise. Multiple handles alias the same hardware, so exclusive
    /// access to a device's ports must be arranged by the caller (the
    /// kernel keeps each driver behind a lock).
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl PortBus for IoBus {
    #[inline]
    fn read(&mut self, port: u16) -> u8 {
        unsafe { inb(port) }
    }

    #[inline]
    fn write(&mut self, port: u16, value: u8) {
        unsafe { outb(port, value) }
    }
}
