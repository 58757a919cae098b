//! Per-Process File Descriptor Table
//!
//! Maps small integer descriptors to open-file handles owned by the
//! filesystem collaborator.
//!
//! # Design
//! - Descriptors 0 and 1 are the console and never stored here
//! - `next_fd` only grows, so a closed descriptor is never handed out
//!   again within the same process
//! - The table never releases a handle itself: removal returns the handle
//!   so the caller can give it back to the filesystem under its lock

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::config::{FIRST_FILE_FD, MAX_OPEN_FILES};
use crate::error::FdError;

/// Descriptor table for one process.
pub struct FileDescriptorTable<F> {
    entries: BTreeMap<i32, F>,
    next_fd: i32,
}

impl<F> FileDescriptorTable<F> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_fd: FIRST_FILE_FD,
        }
    }

    /// Install `file` under a fresh descriptor.
    ///
    /// On exhaustion the handle is handed back with the error so the
    /// caller can release it.
    pub fn add(&mut self, file: F) -> Result<i32, (FdError, F)> {
        if self.entries.len() >= MAX_OPEN_FILES || self.next_fd == i32::MAX {
            return Err((FdError::Exhausted, file));
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.entries.insert(fd, file);
        Ok(fd)
    }

    /// Look up an open descriptor.
    pub fn get(&mut self, fd: i32) -> Result<&mut F, FdError> {
        self.entries.get_mut(&fd).ok_or(FdError::BadDescriptor)
    }

    /// Check if `fd` is open.
    #[inline]
    pub fn contains(&self, fd: i32) -> bool {
        self.entries.contains_key(&fd)
    }

    /// Remove a descriptor, returning its handle for release.
    ///
    /// Closing an unknown descriptor is a harmless no-op for the caller;
    /// it is reported so it can be logged.
    pub fn close(&mut self, fd: i32) -> Result<F, FdError> {
        self.entries.remove(&fd).ok_or(FdError::BadDescriptor)
    }

    /// Remove every descriptor, returning the handles in descriptor order.
    pub fn close_all(&mut self) -> Vec<F> {
        core::mem::take(&mut self.entries).into_values().collect()
    }

    /// Number of open descriptors.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no descriptor is open.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor the next successful `add` will return.
    #[inline]
    pub fn next_fd(&self) -> i32 {
        self.next_fd
    }
}

impl<F> Default for FileDescriptorTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for FileDescriptorTable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptorTable")
            .field("open", &self.entries.keys().collect::<Vec<_>>())
            .field("next_fd", &self.next_fd)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_never_reused() {
        let mut table = FileDescriptorTable::new();
        let a = table.add("a").unwrap();
        let b = table.add("b").unwrap();
        assert_eq!((a, b), (2, 3));

        assert_eq!(table.close(a), Ok("a"));
        let c = table.add("c").unwrap();
        assert_eq!(c, 4);
        assert_eq!(table.get(a), Err(FdError::BadDescriptor));
        assert_eq!(table.get(c).map(|f| *f), Ok("c"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut table = FileDescriptorTable::new();
        let fd = table.add(10u32).unwrap();
        assert_eq!(table.close(fd), Ok(10));
        assert_eq!(table.close(fd), Err(FdError::BadDescriptor));
        assert!(table.is_empty());
    }

    #[test]
    fn test_console_descriptors_unknown() {
        let mut table: FileDescriptorTable<u8> = FileDescriptorTable::new();
        assert!(table.get(0).is_err());
        assert!(table.get(1).is_err());
        assert!(table.get(-5).is_err());
    }

    #[test]
    fn test_close_all_drains() {
        let mut table = FileDescriptorTable::new();
        for i in 0..5 {
            table.add(i).unwrap();
        }
        table.close(3).unwrap();
        assert_eq!(table.close_all(), vec![0, 2, 3, 4]);
        assert_eq!(table.len(), 0);
        assert_eq!(table.next_fd(), 7);
    }

    #[test]
    fn test_exhaustion_returns_handle() {
        let mut table = FileDescriptorTable::new();
        for i in 0..MAX_OPEN_FILES {
            table.add(i).unwrap();
        }
        assert_eq!(table.add(999), Err((FdError::Exhausted, 999)));
        // Closing one frees room, but the descriptor number still advances.
        table.close(2).unwrap();
        let next = table.next_fd();
        assert_eq!(table.add(1000), Ok(next));
    }
}
