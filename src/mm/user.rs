//! User Memory Access
//!
//! Length-checked views over a process's user address space.
//!
//! # Design
//! - `UserMemory` is the only way the syscall layer touches user bytes
//! - Callers validate the region first (see `syscall::validate`); the
//!   memory itself reports a `Fault` for anything it cannot back, which
//!   the syscall layer treats exactly like a failed validation
//! - `ArenaMemory` backs a process with a heap arena (host builds, loaders
//!   that stage images, tests)
//! - `DirectMemory` is the identity-mapped view used on the bare-metal image

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use super::address::{UserAddr, WORD_SIZE};

bitflags! {
    /// Kind of access the kernel is about to perform on a user region.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Kernel reads user bytes (write(2) buffers, paths).
        const READ = 1 << 0;
        /// Kernel stores into user bytes (read(2) buffers).
        const WRITE = 1 << 1;
    }
}

/// An access the memory subsystem could not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// First address of the failed access.
    pub addr: UserAddr,
    /// What the kernel was trying to do.
    pub access: Access,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} fault at {}", self.access, self.addr)
    }
}

/// A process's user address space as seen from the kernel.
pub trait UserMemory {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), Fault>;

    /// Copy `data` into user memory starting at `addr`.
    fn write(&mut self, addr: UserAddr, data: &[u8]) -> Result<(), Fault>;

    /// Read one little-endian stack word.
    fn read_word(&self, addr: UserAddr) -> Result<u32, Fault> {
        let mut raw = [0u8; WORD_SIZE];
        self.read(addr, &mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Read a single byte.
    fn read_byte(&self, addr: UserAddr) -> Result<u8, Fault> {
        let mut raw = [0u8; 1];
        self.read(addr, &mut raw)?;
        Ok(raw[0])
    }
}

/// Heap-backed user memory covering one contiguous mapped range.
///
/// The first `read_only` bytes model a text segment: reads succeed, writes
/// fault. Everything outside `[base, base + len)` is unmapped.
#[derive(Clone)]
pub struct ArenaMemory {
    base: UserAddr,
    bytes: Vec<u8>,
    read_only: usize,
}

impl ArenaMemory {
    /// Map `len` zeroed, writable bytes at `base`.
    pub fn new(base: UserAddr, len: usize) -> Self {
        Self {
            base,
            bytes: vec![0; len],
            read_only: 0,
        }
    }

    /// Mark the first `len` bytes of the arena read-only.
    pub fn with_read_only(mut self, len: usize) -> Self {
        self.read_only = len.min(self.bytes.len());
        self
    }

    /// First mapped address.
    pub fn base(&self) -> UserAddr {
        self.base
    }

    /// One past the last mapped address.
    pub fn end(&self) -> UserAddr {
        UserAddr::new(self.base.as_usize() + self.bytes.len())
    }

    /// Translate `[addr, addr + len)` to an arena range, if fully mapped.
    fn offset(&self, addr: UserAddr, len: usize) -> Option<core::ops::Range<usize>> {
        let start = addr.as_usize().checked_sub(self.base.as_usize())?;
        let end = start.checked_add(len)?;
        if end > self.bytes.len() {
            return None;
        }
        Some(start..end)
    }
}

impl UserMemory for ArenaMemory {
    fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), Fault> {
        let range = self.offset(addr, buf.len()).ok_or(Fault {
            addr,
            access: Access::READ,
        })?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, addr: UserAddr, data: &[u8]) -> Result<(), Fault> {
        let fault = Fault {
            addr,
            access: Access::WRITE,
        };
        let range = self.offset(addr, data.len()).ok_or(fault)?;
        if !data.is_empty() && range.start < self.read_only {
            return Err(fault);
        }
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

impl fmt::Debug for ArenaMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArenaMemory({}..{}, ro={:#x})",
            self.base,
            self.end(),
            self.read_only
        )
    }
}

/// Identity-mapped user memory of the currently active address space.
///
/// Accesses go straight through the MMU. An unmapped address raises a data
/// abort which the trap layer turns into `exit(-1)`; this type never
/// returns `Fault` itself.
#[derive(Debug)]
pub struct DirectMemory {
    _private: (),
}

impl DirectMemory {
    /// Create a view of the active address space.
    ///
    /// # Safety
    /// The caller must be running on behalf of the process whose page table
    /// is installed, and every address passed to this view must have been
    /// validated against the user/kernel split beforehand.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl UserMemory for DirectMemory {
    fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), Fault> {
        if buf.is_empty() {
            return Ok(());
        }
        // SAFETY:
        // - Region was validated to lie in the user half by the caller
        // - Unmapped pages trap to the abort handler, not silently
        // - `buf` is a kernel buffer that cannot overlap user memory
        // Audited: 2025-01-04
        unsafe {
            core::ptr::copy_nonoverlapping(
                addr.as_usize() as *const u8,
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }

    fn write(&mut self, addr: UserAddr, data: &[u8]) -> Result<(), Fault> {
        if data.is_empty() {
            return Ok(());
        }
        // SAFETY: Same as `read`, with the destination in user space.
        unsafe {
            core::ptr::copy_nonoverlapping(
                data.as_ptr(),
                addr.as_usize() as *mut u8,
                data.len(),
            );
        }
        Ok(())
    }
}
