//! PantherOS user/kernel boundary
//!
//! The syscall layer of the PantherOS teaching kernel: it validates what
//! user processes hand across the trap boundary, dispatches the thirteen
//! process and file syscalls, and tracks the parent/child lifecycle that
//! `exec`, `wait` and `exit` depend on.
//!
//! # Architecture
//! - `trap`: decodes ARM64 synchronous exceptions from EL0
//! - `syscall`: number table, argument marshaling, address validation,
//!   handlers
//! - `process`: process registry, one-shot handshakes, descriptor tables
//! - `kernel`: the [`Kernel`] object owning all of the above
//!
//! Scheduling, image loading, the filesystem and the console are supplied
//! by the embedding kernel through [`Platform`].
//!
//! # Security Features
//! - No user pointer is dereferenced before a bounds check
//! - Bad pointers and unknown syscalls end only the offending process
//! - Descriptors are per-process and never reused

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod kernel;
pub mod logger;
pub mod mm;
pub mod platform;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use error::{Fatal, FdError, LaunchError, RegistryError};
pub use fs::FileSystem;
pub use kernel::{Kernel, Outcome};
pub use platform::Platform;
pub use process::{LoadState, Pid};
pub use trap::TrapFrame;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
