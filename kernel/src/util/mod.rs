//! Kernel utilities.

pub mod panic;
