//! Limine boot protocol interface.
//!
//! The kernel declares what it needs as static request structures in a
//! dedicated linker section; Limine scans the binary for them at boot
//! and writes response pointers before jumping to the entry point. The
//! `#[used]` attribute keeps the statics alive even though no Rust code
//! takes their address.
//!
//! Responses are only valid after the kernel has been entered; the
//! accessors below must not be called from statics' initializers.

use limine::BaseRevision;
use limine::request::{BootloaderInfoRequest, MemoryMapRequest};

/// Protocol revision tag, required by Limine before any request.
#[used]
#[unsafe(link_section = ".limine_requests")]
static BASE_REVISION: BaseRevision = BaseRevision::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static BOOTLOADER_INFO_REQUEST: BootloaderInfoRequest = BootloaderInfoRequest::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static MEMORY_MAP_REQUEST: MemoryMapRequest = MemoryMapRequest::new();

/// Name and version strings of the bootloader that started us.
pub fn bootloader_info() -> Option<(&'static str, &'static str)> {
    let response = BOOTLOADER_INFO_REQUEST.get_response()?;
    Some((response.name(), response.version()))
}

/// The physical memory map, sorted by base address and non-overlapping.
///
/// # Panics
///
/// Panics if Limine did not supply a memory map; the kernel cannot
/// reason about physical memory without one.
pub fn memory_map() -> &'static [&'static limine::memory_map::Entry] {
    MEMORY_MAP_REQUEST
        .get_response()
        .expect("Limine memory map response missing")
        .entries()
}

/// Total bytes of usable RAM reported by the bootloader.
pub fn usable_memory() -> u64 {
    memory_map()
        .iter()
        .filter(|entry| entry.entry_type == limine::memory_map::EntryType::USABLE)
        .map(|entry| entry.length)
        .sum()
}
