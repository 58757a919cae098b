//! Memory interface for the syscall layer
//!
//! Provides:
//! - User address type and address-space layout constants
//! - Checked views over user memory
//!
//! # Security Principles
//! - The kernel never forms a pointer from a user value without a
//!   bounds check first
//! - Faults are values, not panics

pub mod address;
pub mod user;

pub use address::{UserAddr, PAGE_SIZE, PHYS_BASE, USER_BASE, WORD_SIZE};
pub use user::{Access, ArenaMemory, DirectMemory, Fault, UserMemory};
