//! Architecture abstraction.
//!
//! Re-exports the current architecture's implementation. The rest of the
//! kernel uses `crate::arch::*` and never names `x86_64` directly; a
//! second architecture would add a module here with the same surface.

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use x86_64::*;
