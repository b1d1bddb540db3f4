//! Global Descriptor Table.
//!
//! Long mode mostly ignores segmentation, but the CPU still demands a
//! valid GDT and valid selectors in CS/SS before interrupts can be
//! taken. The layout is fixed: null, kernel code, kernel data, user
//! code, user data. Selector values are derived from the entry indices
//! and never change.
//!
//! Descriptor packing follows the hardware layout exactly:
//!
//! ```text
//! bits  0..16   limit 0..16
//! bits 16..40   base  0..24
//! bits 40..48   access byte
//! bits 48..52   limit 16..20
//! bits 52..56   flags nibble
//! bits 56..64   base 24..32
//! ```

use bitflags::bitflags;

bitflags! {
    /// The access byte of a segment descriptor (bits 40..48).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Segment was accessed by the CPU. Pre-set to avoid a write
        /// to the descriptor on first use.
        const ACCESSED   = 1 << 0;
        /// Code: readable. Data: writable.
        const READ_WRITE = 1 << 1;
        /// Code: conforming. Data: grows down.
        const CONFORMING = 1 << 2;
        /// Set for code segments, clear for data segments.
        const EXECUTABLE = 1 << 3;
        /// Set for code/data descriptors, clear for system descriptors.
        const USER_TYPE  = 1 << 4;
        /// Descriptor privilege level, low bit.
        const DPL_LOW    = 1 << 5;
        /// Descriptor privilege level, high bit.
        const DPL_HIGH   = 1 << 6;
        /// Descriptor is valid.
        const PRESENT    = 1 << 7;

        const DPL_RING3 = Self::DPL_LOW.bits() | Self::DPL_HIGH.bits();
    }
}

/// Flags nibble (bits 52..56): granularity and mode bits.
pub mod flags {
    /// Limit is in 4 KiB pages rather than bytes.
    pub const GRANULARITY_4K: u8 = 0b1000;
    /// 32-bit protected-mode segment (data segments in long mode).
    pub const SIZE_32: u8 = 0b0100;
    /// 64-bit code segment.
    pub const LONG_MODE: u8 = 0b0010;
}

/// A packed 8-byte segment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentDescriptor(u64);

impl SegmentDescriptor {
    /// The mandatory all-zero descriptor at index 0.
    pub const NULL: Self = Self(0);

    /// Packs `base`, `limit`, `access`, and the flags nibble into the
    /// hardware layout. Only the low 20 bits of `limit` and the low 4
    /// bits of `flags` are representable; callers pass values in range.
    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        let mut raw = 0u64;
        raw |= (limit & 0xFFFF) as u64;
        raw |= ((base & 0x00FF_FFFF) as u64) << 16;
        raw |= (access as u64) << 40;
        raw |= (((limit >> 16) & 0xF) as u64) << 48;
        raw |= ((flags & 0xF) as u64) << 52;
        raw |= (((base >> 24) & 0xFF) as u64) << 56;
        Self(raw)
    }

    /// The raw descriptor bits as the CPU reads them.
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// Selector values for the fixed GDT layout. A selector is the entry's
/// byte offset into the table, with the requested privilege level in
/// the low two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selectors {
    pub kernel_code: u16,
    pub kernel_data: u16,
    pub user_code: u16,
    pub user_data: u16,
}

impl Selectors {
    pub const fn new() -> Self {
        Self {
            kernel_code: 0x08,
            kernel_data: 0x10,
            user_code: 0x18 | 3,
            user_data: 0x20 | 3,
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::new()
    }
}

/// The descriptor table itself. Alignment keeps the table on one cache
/// line; the CPU only requires 8.
#[derive(Debug)]
#[repr(C, align(16))]
pub struct Gdt {
    entries: [SegmentDescriptor; 5],
}

/// The operand of `lgdt`: table limit in bytes minus one, then base.
#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u64,
}

impl Gdt {
    /// Builds the five-entry flat-model table.
    ///
    /// Code segments carry the long-mode flag, data segments the 32-bit
    /// size flag; all span the full 4 GiB with page granularity. The
    /// user entries differ from the kernel ones only in DPL.
    pub fn new() -> Self {
        let code = Access::PRESENT
            | Access::USER_TYPE
            | Access::EXECUTABLE
            | Access::READ_WRITE
            | Access::ACCESSED;
        let data = Access::PRESENT | Access::USER_TYPE | Access::READ_WRITE | Access::ACCESSED;

        let kernel_code = SegmentDescriptor::new(
            0,
            0xF_FFFF,
            code.bits(),
            flags::GRANULARITY_4K | flags::LONG_MODE,
        );
        let kernel_data = SegmentDescriptor::new(
            0,
            0xF_FFFF,
            data.bits(),
            flags::GRANULARITY_4K | flags::SIZE_32,
        );
        let user_code = SegmentDescriptor::new(
            0,
            0xF_FFFF,
            (code | Access::DPL_RING3).bits(),
            flags::GRANULARITY_4K | flags::LONG_MODE,
        );
        let user_data = SegmentDescriptor::new(
            0,
            0xF_FFFF,
            (data | Access::DPL_RING3).bits(),
            flags::GRANULARITY_4K | flags::SIZE_32,
        );

        Self {
            entries: [
                SegmentDescriptor::NULL,
                kernel_code,
                kernel_data,
                user_code,
                user_data,
            ],
        }
    }

    /// The descriptor at `index`, for inspection.
    pub fn entry(&self, index: usize) -> SegmentDescriptor {
        self.entries[index]
    }

    /// Loads this table and reloads the segment registers.
    ///
    /// CS cannot be written with `mov`; the far return pushes the new
    /// selector and the continuation address and `retfq` pops both,
    /// which reloads CS as a side effect.
    ///
    /// # Safety
    ///
    /// The table must describe valid flat-model segments and must stay
    /// alive and unmoved for as long as the CPU may reference it, which
    /// the `'static` bound enforces. Interrupts must be disabled by the
    /// caller.
    #[cfg(target_os = "none")]
    pub unsafe fn load(&'static self, selectors: &Selectors) {
        let pointer = GdtPointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: self.entries.as_ptr() as u64,
        };

        unsafe {
            core::arch::asm!(
                "lgdt [{ptr}]",
                // Far return to reload CS.
                "lea {tmp}, [2f + rip]",
                "push {code:r}",
                "push {tmp}",
                "retfq",
                "2:",
                "mov ds, {data:x}",
                "mov es, {data:x}",
                "mov ss, {data:x}",
                ptr = in(reg) &pointer,
                tmp = out(reg) _,
                code = in(reg) selectors.kernel_code as u64,
                data = in(reg) selectors.kernel_data,
                options(preserves_flags)
            );
        }
    }

    #[cfg(not(target_os = "none"))]
    pub unsafe fn load(&'static self, _selectors: &Selectors) {
        let _ = GdtPointer { limit: 0, base: 0 };
    }
}

impl Default for Gdt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_splits_across_both_fields() {
        let d = SegmentDescriptor::new(0, 0xF_FFFF, 0, 0);
        assert_eq!(d.bits() & 0xFFFF, 0xFFFF);
        assert_eq!((d.bits() >> 48) & 0xF, 0xF);
    }

    #[test]
    fn base_splits_across_both_fields() {
        let d = SegmentDescriptor::new(0xAABB_CCDD, 0, 0, 0);
        assert_eq!((d.bits() >> 16) & 0xFF_FFFF, 0xBB_CCDD);
        assert_eq!((d.bits() >> 56) & 0xFF, 0xAA);
    }

    #[test]
    fn access_and_flags_land_in_their_nibbles() {
        let d = SegmentDescriptor::new(0, 0, 0x9A, 0xA);
        assert_eq!((d.bits() >> 40) & 0xFF, 0x9A);
        assert_eq!((d.bits() >> 52) & 0xF, 0xA);
    }

    #[test]
    fn kernel_code_descriptor_matches_known_encoding() {
        // The canonical long-mode flat code descriptor.
        let gdt = Gdt::new();
        assert_eq!(gdt.entry(1).bits(), 0x00AF_9B00_0000_FFFF);
    }

    #[test]
    fn kernel_data_descriptor_matches_known_encoding() {
        let gdt = Gdt::new();
        assert_eq!(gdt.entry(2).bits(), 0x00CF_9300_0000_FFFF);
    }

    #[test]
    fn user_entries_differ_from_kernel_only_in_dpl() {
        let gdt = Gdt::new();
        let dpl_mask = (Access::DPL_RING3.bits() as u64) << 40;
        assert_eq!(gdt.entry(3).bits(), gdt.entry(1).bits() | dpl_mask);
        assert_eq!(gdt.entry(4).bits(), gdt.entry(2).bits() | dpl_mask);
    }

    #[test]
    fn null_descriptor_is_all_zeroes() {
        assert_eq!(Gdt::new().entry(0).bits(), 0);
    }

    #[test]
    fn selectors_point_at_their_entries() {
        let s = Selectors::new();
        assert_eq!(s.kernel_code, 0x08);
        assert_eq!(s.kernel_data, 0x10);
        assert_eq!(s.user_code, 0x1B);
        assert_eq!(s.user_data, 0x23);
    }
}
