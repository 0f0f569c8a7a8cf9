//! Kernel Panic Handler
//!
//! Bridges the Rust-level `#[panic_handler]` in the final binary into
//! Kernel Recovery Mode. Exists as its own module (rather than having
//! `main.rs` call `krm` directly) so the `aos-kernel` crate owns its whole
//! failure path, the same way it owns bring-up.

/// Hand a panic off to Kernel Recovery Mode. Never returns.
pub fn handle_panic(message: &str, file: &str, line: u32) -> ! {
    crate::krm::krm_enter_panic(message, file, line)
}
