//! Console drivers
//!
//! The syscall layer only sees the `Console` trait; `uart` is the
//! PL011 backend used on the QEMU virt image.
//!
//! Drivers never panic on device state and keep unsafe code to their
//! register accessors.

pub mod console;
pub mod uart;

pub use console::Console;
pub use uart::Uart;
