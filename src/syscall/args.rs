//! Argument marshaling from the user stack.
//!
//! Calling convention: the syscall number sits at the trapped stack
//! pointer and argument `i` at `sp + (i + 1) * WORD_SIZE`. Every slot is
//! bounds-checked for its full width before it is read, and the first bad
//! slot aborts the whole call, so a half-filled argument array never
//! reaches a handler.

use crate::error::Fatal;
use crate::mm::{UserAddr, UserMemory, WORD_SIZE};

use super::table::PointerArgs;
use super::validate::check_user_region;

/// Most arguments any syscall takes.
pub const MAX_ARGS: usize = 3;

/// Arguments of one syscall, as raw stack words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallArgs {
    words: [u32; MAX_ARGS],
    count: usize,
}

impl SyscallArgs {
    /// Build from already-marshaled words.
    pub fn from_words(words: &[u32]) -> Self {
        assert!(words.len() <= MAX_ARGS, "too many syscall arguments");
        let mut out = [0; MAX_ARGS];
        out[..words.len()].copy_from_slice(words);
        Self {
            words: out,
            count: words.len(),
        }
    }

    /// Number of marshaled words.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the call took no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw word `i`.
    ///
    /// # Panics
    /// If `i` was not marshaled; the dispatch table fixes the count per
    /// call, so this is a kernel bug.
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        assert!(i < self.count, "argument {} not marshaled", i);
        self.words[i]
    }

    /// Word `i` as a signed integer (status, pid, fd).
    #[inline]
    pub fn int(&self, i: usize) -> i32 {
        self.word(i) as i32
    }

    /// Word `i` as an unsigned integer (size, position).
    #[inline]
    pub fn uint(&self, i: usize) -> u32 {
        self.word(i)
    }

    /// Word `i` as a user pointer. Still needs length-aware validation.
    #[inline]
    pub fn addr(&self, i: usize) -> UserAddr {
        UserAddr::from_word(self.word(i))
    }
}

/// Read the syscall number at the trapped stack pointer.
pub fn read_syscall_number<M: UserMemory>(memory: &M, sp: UserAddr) -> Result<u32, Fatal> {
    check_user_region(sp, WORD_SIZE)?;
    Ok(memory.read_word(sp)?)
}

/// Read `count` argument words above the syscall number.
pub fn marshal<M: UserMemory>(
    memory: &M,
    sp: UserAddr,
    count: usize,
) -> Result<SyscallArgs, Fatal> {
    assert!(count <= MAX_ARGS, "too many syscall arguments");

    let mut words = [0u32; MAX_ARGS];
    for (i, word) in words.iter_mut().enumerate().take(count) {
        let slot = sp.slot(i + 1).ok_or(Fatal::BadAddress(sp))?;
        check_user_region(slot, WORD_SIZE)?;
        *word = memory.read_word(slot)?;
    }
    Ok(SyscallArgs { words, count })
}

/// Gate every pointer argument: it must at least name one user byte.
///
/// Handlers still revalidate the full length they access.
pub fn gate_pointers(args: &SyscallArgs, pointers: PointerArgs) -> Result<(), Fatal> {
    for (i, flag) in [PointerArgs::ARG0, PointerArgs::ARG1, PointerArgs::ARG2]
        .into_iter()
        .enumerate()
    {
        if pointers.contains(flag) && i < args.len() {
            check_user_region(args.addr(i), 1)?;
        }
    }
    Ok(())
}
