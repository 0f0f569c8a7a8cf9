//! aOS Kernel Library
//!
//! Re-exports the per-concern crates under one facade so an external
//! caller (an integration test, a future second binary target) can depend
//! on a single path instead of naming each workspace member.

#![no_std]

pub use aos_arch_x86 as arch;
pub use aos_drivers as drivers;
pub use aos_kernel as kernel;
pub use aos_mm as mm;
