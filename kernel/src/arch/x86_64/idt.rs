//! Interrupt Descriptor Table.
//!
//! 256 gates, one per vector. Each gate splits a 64-bit handler address
//! across three fields and carries the code-segment selector the CPU
//! switches to plus a type/attribute word:
//!
//! ```text
//! bits  0..3   IST index (0 = stay on the current stack)
//! bits  8..12  gate type (0xE interrupt gate, 0xF trap gate)
//! bits 13..15  descriptor privilege level
//! bit  15      present
//! ```
//!
//! The table is built with every slot missing, then gates are installed
//! for exactly the vectors that have trampolines. Loading an unbuilt or
//! half-built table is prevented by the boot sequence, not by runtime
//! checks.

/// Type/attribute word of a gate, bits 8..16 of the entry's second u16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct EntryOptions(u16);

impl EntryOptions {
    /// An interrupt gate (interrupts auto-masked on entry), not
    /// present, DPL 0, no IST.
    pub const fn minimal() -> Self {
        Self(0xE00)
    }

    pub const fn present(mut self, present: bool) -> Self {
        if present {
            self.0 |= 1 << 15;
        } else {
            self.0 &= !(1 << 15);
        }
        self
    }

    /// Sets the privilege level required to invoke this gate with an
    /// `int` instruction. Ring 3 is needed for the syscall gate.
    pub const fn privilege_level(mut self, dpl: u16) -> Self {
        self.0 = (self.0 & !(0b11 << 13)) | ((dpl & 0b11) << 13);
        self
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// One packed 16-byte interrupt gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    options: EntryOptions,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl IdtEntry {
    /// A slot with no handler: not present, all fields zero.
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            options: EntryOptions(0),
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    fn set_handler(&mut self, handler: u64, selector: u16, options: EntryOptions) {
        self.offset_low = handler as u16;
        self.offset_mid = (handler >> 16) as u16;
        self.offset_high = (handler >> 32) as u32;
        self.selector = selector;
        self.options = options.present(true);
    }

    pub fn is_present(&self) -> bool {
        self.options.bits() & (1 << 15) != 0
    }

    /// Reassembles the handler address from the three offset fields.
    pub fn handler_address(&self) -> u64 {
        self.offset_low as u64 | (self.offset_mid as u64) << 16 | (self.offset_high as u64) << 32
    }

    pub fn options(&self) -> EntryOptions {
        self.options
    }
}

/// The full 256-entry table.
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

/// The operand of `lidt`.
#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u64,
}

impl Idt {
    /// An empty table: every vector missing.
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); 256],
        }
    }

    /// Installs a ring-0 interrupt gate for `vector` pointing at a
    /// trampoline entry point.
    pub fn install(&mut self, vector: u8, handler: unsafe extern "C" fn(), selector: u16) {
        self.entries[vector as usize].set_handler(
            handler as usize as u64,
            selector,
            EntryOptions::minimal(),
        );
    }

    /// Installs a gate invokable from ring 3 (`int` from user mode).
    pub fn install_user(&mut self, vector: u8, handler: unsafe extern "C" fn(), selector: u16) {
        self.entries[vector as usize].set_handler(
            handler as usize as u64,
            selector,
            EntryOptions::minimal().privilege_level(3),
        );
    }

    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[vector as usize]
    }

    /// Loads this table into the IDTR.
    ///
    /// # Safety
    ///
    /// Every present gate must point at a real trampoline, and the
    /// table must outlive all interrupt delivery, which the `'static`
    /// bound enforces.
    #[cfg(target_os = "none")]
    pub unsafe fn load(&'static self) {
        let pointer = IdtPointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: self.entries.as_ptr() as u64,
        };

        unsafe {
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &pointer,
                options(readonly, nostack, preserves_flags)
            );
        }
    }

    #[cfg(not(target_os = "none"))]
    pub unsafe fn load(&'static self) {
        let _ = IdtPointer { limit: 0, base: 0 };
    }
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn dummy_handler() {}

    #[test]
    fn gate_splits_handler_address_across_fields() {
        let mut idt = Idt::new();
        idt.install(3, dummy_handler, 0x08);

        let entry = idt.entry(3);
        assert!(entry.is_present());
        assert_eq!(entry.handler_address(), dummy_handler as usize as u64);
        assert_eq!(entry.selector, 0x08);
    }

    #[test]
    fn minimal_options_encode_an_interrupt_gate() {
        let opts = EntryOptions::minimal();
        assert_eq!((opts.bits() >> 8) & 0xF, 0xE);
        assert_eq!(opts.bits() & (1 << 15), 0);
    }

    #[test]
    fn present_bit_is_bit_fifteen() {
        let opts = EntryOptions::minimal().present(true);
        assert_eq!(opts.bits() & (1 << 15), 1 << 15);
        assert_eq!(opts.present(false).bits() & (1 << 15), 0);
    }

    #[test]
    fn privilege_level_occupies_bits_thirteen_and_fourteen() {
        let opts = EntryOptions::minimal().privilege_level(3);
        assert_eq!((opts.bits() >> 13) & 0b11, 3);
        assert_eq!(opts.privilege_level(0).bits() >> 13 & 0b11, 0);
    }

    #[test]
    fn user_gate_carries_ring_three_dpl() {
        let mut idt = Idt::new();
        idt.install_user(0x80, dummy_handler, 0x08);
        assert_eq!((idt.entry(0x80).options().bits() >> 13) & 0b11, 3);
    }

    #[test]
    fn fresh_table_has_no_present_gates() {
        let idt = Idt::new();
        for vector in 0..=255u8 {
            assert!(!idt.entry(vector).is_present());
        }
    }
}
