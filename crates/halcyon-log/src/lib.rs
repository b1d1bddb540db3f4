//! Kernel logging subsystem.
//!
//! Implements the [`log`] facade on top of the serial UART so every
//! subsystem logs with the ordinary `log::info!`/`log::warn!` macros.
//! Each record is written atomically (the serial lock is held, with
//! interrupts masked, for the whole line) with an ANSI-colored level
//! prefix:
//!
//! ```text
//! [ INFO] halcyon_kernel::memory::heap: heap initialised: 4096 KiB
//! ```
//!
//! [`kprint!`]/[`kprintln!`] bypass the level machinery for unleveled
//! output such as the boot banner.

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::fmt::Write;
use log::{Level, LevelFilter, Metadata, Record};

/// The logger singleton installed into the `log` facade.
static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger with the given level filter.
///
/// The serial port must already be initialized. Fails if a logger was
/// installed before; there is exactly one install during boot.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// A `log::Log` implementation draining to the COM1 UART.
struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // One lock acquisition per record keeps lines from interleaving.
        halcyon_hw::serial::with_port(|port| {
            let _ = write!(
                port,
                "{}[{}]\x1b[0m {}: ",
                color(record.level()),
                label(record.level()),
                record.target()
            );
            let _ = port.write_fmt(*record.args());
            let _ = port.write_str("\n");
        });
    }

    fn flush(&self) {}
}

fn label(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRACE",
        Level::Debug => "DEBUG",
        Level::Info => " INFO",
        Level::Warn => " WARN",
        Level::Error => "ERROR",
    }
}

fn color(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[90m", // gray
        Level::Debug => "\x1b[36m", // cyan
        Level::Info => "\x1b[32m",  // green
        Level::Warn => "\x1b[33m",  // yellow
        Level::Error => "\x1b[31m", // red
    }
}

/// Writes unleveled formatted text to the serial console.
///
/// Not meant to be called directly — use [`kprint!`] / [`kprintln!`].
#[doc(hidden)]
pub fn _kprint(args: fmt::Arguments) {
    halcyon_hw::serial::with_port(|port| {
        let _ = port.write_fmt(args);
    });
}

/// Prints formatted text to the serial console, without a level prefix.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::_kprint(format_args!($($arg)*))
    };
}

/// Prints formatted text followed by a newline to the serial console.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::kprint!("{}\n", format_args!($($arg)*))
    };
}
