//! aOS Kernel Main Entry Point
//!
//! This is the main entry point for the aOS kernel.

#![no_std]
#![no_main]

use core::fmt::Write;
use core::panic::PanicInfo;

/// Kernel entry point
#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    aos_drivers::init();

    aos_kernel::printk::printk("aOS kernel starting...\n");
    aos_kernel::printk::printk("Version: 0.1.0\n");

    aos_arch_x86::init();
    aos_mm::init();
    aos_kernel::init();

    aos_kernel::printk::printk("aOS kernel initialization complete!\n");

    loop {
        aos_arch_x86::halt();
    }
}

/// Render a `PanicInfo`'s message into a fixed stack buffer. There is no
/// allocator this early, and panic handling must not assume one exists.
struct FixedCursor {
    buf: [u8; 256],
    len: usize,
}

impl Write for FixedCursor {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let remaining = self.buf.len() - self.len;
        let n = s.len().min(remaining);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

/// Panic handler: hands off to Kernel Recovery Mode rather than printing
/// and looping here.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    let location = info.location();
    let file = location.map(|l| l.file()).unwrap_or("");
    let line = location.map(|l| l.line()).unwrap_or(0);

    let mut cursor = FixedCursor {
        buf: [0u8; 256],
        len: 0,
    };
    let _ = write!(cursor, "{}", info.message());
    let message = core::str::from_utf8(&cursor.buf[..cursor.len]).unwrap_or("");

    aos_kernel::panic::handle_panic(message, file, line)
}
