//! Error types shared across the syscall layer.
//!
//! Only `Fatal` ever crosses a handler boundary: it unwinds to process
//! teardown with status -1. Everything else is converted into a sentinel
//! return value where it is detected.

use core::fmt;

use crate::mm::{Fault, UserAddr};

/// A condition that ends the calling process with status -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatal {
    /// A user region failed the bounds check.
    BadAddress(UserAddr),
    /// A validated region was not backed by memory.
    Fault(Fault),
    /// The syscall number is not in the dispatch table.
    UnknownSyscall(u32),
    /// A string argument had no NUL within the copy-in limit.
    UnterminatedString(UserAddr),
}

impl From<Fault> for Fatal {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress(addr) => write!(f, "bad user address {}", addr),
            Self::Fault(fault) => write!(f, "{}", fault),
            Self::UnknownSyscall(nr) => write!(f, "unknown syscall {}", nr),
            Self::UnterminatedString(addr) => write!(f, "unterminated string at {}", addr),
        }
    }
}

/// Errors from process registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No record exists for the pid.
    NoSuchProcess,
    /// The pid is not a registered direct child of the caller.
    NotAChild,
    /// The one-shot signal was already raised.
    AlreadySignaled,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchProcess => write!(f, "no such process"),
            Self::NotAChild => write!(f, "not a child of the caller"),
            Self::AlreadySignaled => write!(f, "signal already raised"),
        }
    }
}

/// Errors from the execution-context launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchError {
    /// The scheduler could not create an execution context.
    OutOfContexts,
    /// The command line was empty or not valid text.
    BadCommandLine,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfContexts => write!(f, "no execution context available"),
            Self::BadCommandLine => write!(f, "bad command line"),
        }
    }
}

/// Errors from descriptor table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdError {
    /// The descriptor is not open in this process.
    BadDescriptor,
    /// The table is full.
    Exhausted,
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadDescriptor => write!(f, "bad file descriptor"),
            Self::Exhausted => write!(f, "descriptor table full"),
        }
    }
}
