//! x86_64 architecture support: descriptor tables, trap trampolines,
//! and the Limine boot protocol interface.

pub mod boot;
pub mod gdt;
pub mod idt;
pub mod stubs;
