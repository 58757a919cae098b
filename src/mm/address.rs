//! User Address Types and Layout
//!
//! Type-safe wrapper for addresses handed to the kernel by user code, plus
//! the constants describing the user half of the address space.
//!
//! # Layout
//! ```text
//! 0x0000_0000 ┌──────────────────────┐
//!             │  unmapped / null      │
//! 0x0804_8000 ├──────────────────────┤ USER_BASE
//!             │  user code, data,     │
//!             │  heap and stack       │
//! 0xC000_0000 ├──────────────────────┤ PHYS_BASE
//!             │  kernel               │
//!             └──────────────────────┘
//! ```
//!
//! # Security Properties
//! - A `UserAddr` is only a number; it cannot be dereferenced
//! - Arithmetic is checked, so an overflowing offset never wraps into range

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Lowest address user code may touch (start of the code segment).
pub const USER_BASE: usize = 0x0804_8000;

/// Kernel/user split. Every user byte lies strictly below this address.
pub const PHYS_BASE: usize = 0xC000_0000;

/// Size of one stack slot in the syscall calling convention.
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// An address supplied by user code.
///
/// Nothing about this type claims the address is valid; use
/// [`crate::syscall::validate`] before touching the memory behind it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct UserAddr(usize);

impl UserAddr {
    /// Create a new user address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Create a user address from a raw stack word.
    #[inline]
    pub const fn from_word(word: u32) -> Self {
        Self(word as usize)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Address of stack slot `index` above this one.
    #[inline]
    pub const fn slot(self, index: usize) -> Option<Self> {
        match index.checked_mul(WORD_SIZE) {
            Some(offset) => self.checked_add(offset),
            None => None,
        }
    }

    /// Check if this address lies in the user half.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 >= USER_BASE && self.0 < PHYS_BASE
    }
}

impl fmt::Debug for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAddr({:#010x})", self.0)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_half() {
        assert!(UserAddr::new(USER_BASE).is_user());
        assert!(UserAddr::new(PHYS_BASE - 1).is_user());
        assert!(!UserAddr::new(PHYS_BASE).is_user());
        assert!(!UserAddr::new(USER_BASE - 1).is_user());
        assert!(!UserAddr::new(0).is_user());
    }

    #[test]
    fn test_slot_arithmetic() {
        let sp = UserAddr::new(0xBFFF_FF00);
        assert_eq!(sp.slot(0), Some(sp));
        assert_eq!(sp.slot(3).map(UserAddr::as_usize), Some(0xBFFF_FF0C));
        assert_eq!(UserAddr::new(usize::MAX - 2).slot(1), None);
    }
}
