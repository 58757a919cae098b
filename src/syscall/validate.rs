//! System Call Input Validation
//!
//! Bounds checks for every user address the syscall layer touches.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: any failed check ends the calling process with -1
//! - Prevent common vulnerabilities:
//!   - Kernel memory disclosure (upper bound at PHYS_BASE)
//!   - Null and low-page dereference (lower bound at USER_BASE)
//!   - Wrap-around (checked end address)
//!
//! The checks are syntactic. An in-range address that is not mapped still
//! faults; `UserMemory` reports that and the caller treats it the same way.

use alloc::vec::Vec;

use crate::config::MAX_USER_STRING;
use crate::error::Fatal;
use crate::mm::{UserAddr, UserMemory, PHYS_BASE, USER_BASE};

/// Check that every byte of `[addr, addr + size)` is a user address.
///
/// A zero-length region touches no byte and is always valid.
pub fn is_valid_user_region(addr: UserAddr, size: usize) -> bool {
    if size == 0 {
        return true;
    }
    let start = addr.as_usize();
    // Last byte, not one-past-the-end, so a region ending exactly at
    // PHYS_BASE is accepted.
    let Some(last) = start.checked_add(size - 1) else {
        return false;
    };
    start >= USER_BASE && last < PHYS_BASE
}

/// Validate a region, turning failure into a fatal violation.
#[inline]
pub fn check_user_region(addr: UserAddr, size: usize) -> Result<(), Fatal> {
    if is_valid_user_region(addr, size) {
        Ok(())
    } else {
        log::warn!("[SYSCALL] rejected user region {} +{:#x}", addr, size);
        Err(Fatal::BadAddress(addr))
    }
}

/// A validated user buffer the kernel reads from.
#[derive(Debug, Clone, Copy)]
pub struct UserBuffer {
    addr: UserAddr,
    len: usize,
}

/// A validated user buffer the kernel writes into.
#[derive(Debug, Clone, Copy)]
pub struct UserBufferMut {
    addr: UserAddr,
    len: usize,
}

/// Validate a user-space buffer the kernel will read.
///
/// # Security Checks
/// 1. Start is at or above USER_BASE
/// 2. Start + length doesn't overflow
/// 3. Last byte is below PHYS_BASE
pub fn validate_user_read(addr: UserAddr, len: usize) -> Result<UserBuffer, Fatal> {
    check_user_region(addr, len)?;
    Ok(UserBuffer { addr, len })
}

/// Validate a user-space buffer the kernel will write.
///
/// Same bounds as read validation; write permission is enforced by the
/// memory itself.
pub fn validate_user_write(addr: UserAddr, len: usize) -> Result<UserBufferMut, Fatal> {
    let read_buf = validate_user_read(addr, len)?;
    Ok(UserBufferMut {
        addr: read_buf.addr,
        len: read_buf.len,
    })
}

impl UserBuffer {
    /// Length of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `out.len()` bytes starting `offset` bytes into the buffer.
    ///
    /// Panics if the requested window exceeds the validated length; that
    /// is a kernel bug, not a user error.
    pub fn copy_in<M: UserMemory>(
        &self,
        memory: &M,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), Fatal> {
        assert!(offset + out.len() <= self.len, "copy_in past validated buffer");
        let addr = self.addr.checked_add(offset).ok_or(Fatal::BadAddress(self.addr))?;
        memory.read(addr, out)?;
        Ok(())
    }
}

impl UserBufferMut {
    /// Length of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `data` starting `offset` bytes into the buffer.
    pub fn copy_out<M: UserMemory>(
        &self,
        memory: &mut M,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Fatal> {
        assert!(offset + data.len() <= self.len, "copy_out past validated buffer");
        let addr = self.addr.checked_add(offset).ok_or(Fatal::BadAddress(self.addr))?;
        memory.write(addr, data)?;
        Ok(())
    }
}

/// Copy a NUL-terminated user string into the kernel.
///
/// Every byte is validated before it is read, so a string running into
/// kernel space is caught at the first kernel byte. The NUL is not
/// included in the result.
pub fn read_user_string<M: UserMemory>(memory: &M, addr: UserAddr) -> Result<Vec<u8>, Fatal> {
    let mut bytes = Vec::new();
    for offset in 0..MAX_USER_STRING {
        let cursor = addr.checked_add(offset).ok_or(Fatal::BadAddress(addr))?;
        check_user_region(cursor, 1)?;
        match memory.read_byte(cursor)? {
            0 => return Ok(bytes),
            byte => bytes.push(byte),
        }
    }
    log::warn!("[SYSCALL] string at {} exceeds {} bytes", addr, MAX_USER_STRING);
    Err(Fatal::UnterminatedString(addr))
}
