//! Hardware primitives for the Halcyon kernel.
//!
//! This crate is the bottom of the stack: raw port and register access,
//! CPU intrinsics, and the boot-critical device drivers (16550 UART,
//! 8259 PIC, 8253/8254 PIT). Everything above it — descriptor tables,
//! dispatch, the HAL capability layer — goes through these primitives
//! instead of touching hardware directly.
//!
//! The crate builds for `x86_64-unknown-none` and for hosted targets.
//! On hosted targets the privileged instructions are compiled but never
//! reached: the device drivers are generic over [`port::PortBus`], so unit
//! tests drive them with a recording mock instead of the real I/O bus.

#![cfg_attr(not(test), no_std)]

pub mod cpu;
pub mod pic;
pub mod pit;
pub mod port;
pub mod serial;
