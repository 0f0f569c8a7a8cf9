//! Kernel-wide console logging
//!
//! The only logging facility in this kernel: a `core::fmt::Write`-backed
//! formatter fanned out to the VGA text console and COM1. There is no
//! separate `log`-crate indirection, since nothing exists yet to configure
//! a subscriber before the VFS comes up.

use core::fmt::{self, Write};

use aos_drivers::{serial, vga};
use spin::Mutex;

/// Sink that forwards every write to both consoles.
struct DualWriter;

impl Write for DualWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        vga::write_str(s);
        serial::write_str(s);
        Ok(())
    }
}

static WRITER: Mutex<DualWriter> = Mutex::new(DualWriter);

/// Write a string to both the VGA console and COM1.
pub fn printk(s: &str) {
    let _ = WRITER.lock().write_str(s);
}

/// `core::format_args!`-driven logging, backing the [`kprintln!`] macro.
pub fn printk_fmt(args: fmt::Arguments) {
    let _ = WRITER.lock().write_fmt(args);
}

/// Formatted logging to both console sinks, trailing newline included.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::printk::printk("\n")
    };
    ($($arg:tt)*) => {{
        $crate::printk::printk_fmt(format_args!($($arg)*));
        $crate::printk::printk("\n");
    }};
}

/// Formatted logging to both console sinks, no trailing newline.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::printk::printk_fmt(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printk_accepts_empty_string() {
        printk("");
    }
}
