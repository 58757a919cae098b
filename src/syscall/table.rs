//! System call numbers and the dispatch table.
//!
//! Each entry records how many stack words the call takes and which of
//! them are user pointers that the handler must revalidate for their full
//! access size before use.

use bitflags::bitflags;

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: u32 = 0;
    pub const SYS_EXIT: u32 = 1;
    pub const SYS_EXEC: u32 = 2;
    pub const SYS_WAIT: u32 = 3;
    pub const SYS_CREATE: u32 = 5;
    pub const SYS_REMOVE: u32 = 6;
    pub const SYS_OPEN: u32 = 7;
    pub const SYS_FILESIZE: u32 = 8;
    pub const SYS_READ: u32 = 9;
    pub const SYS_WRITE: u32 = 10;
    pub const SYS_SEEK: u32 = 11;
    pub const SYS_TELL: u32 = 12;
    pub const SYS_CLOSE: u32 = 13;
}

bitflags! {
    /// Arguments that carry user pointers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PointerArgs: u8 {
        const ARG0 = 1 << 0;
        const ARG1 = 1 << 1;
        const ARG2 = 1 << 2;
    }
}

/// A recognized system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Halt,
    Exit,
    Exec,
    Wait,
    Create,
    Remove,
    Open,
    Filesize,
    Read,
    Write,
    Seek,
    Tell,
    Close,
}

/// Dispatch table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallSpec {
    pub call: Syscall,
    /// Number of argument words after the syscall number.
    pub argc: usize,
    /// Which of those words are user pointers.
    pub pointers: PointerArgs,
}

const fn spec(call: Syscall, argc: usize, pointers: PointerArgs) -> SyscallSpec {
    SyscallSpec {
        call,
        argc,
        pointers,
    }
}

/// Look up a syscall number. Unknown numbers yield `None`.
pub fn lookup(nr: u32) -> Option<SyscallSpec> {
    use self::numbers::*;

    let entry = match nr {
        SYS_HALT => spec(Syscall::Halt, 0, PointerArgs::empty()),
        SYS_EXIT => spec(Syscall::Exit, 1, PointerArgs::empty()),
        SYS_EXEC => spec(Syscall::Exec, 1, PointerArgs::ARG0),
        SYS_WAIT => spec(Syscall::Wait, 1, PointerArgs::empty()),
        SYS_CREATE => spec(Syscall::Create, 2, PointerArgs::ARG0),
        SYS_REMOVE => spec(Syscall::Remove, 1, PointerArgs::ARG0),
        SYS_OPEN => spec(Syscall::Open, 1, PointerArgs::ARG0),
        SYS_FILESIZE => spec(Syscall::Filesize, 1, PointerArgs::empty()),
        SYS_READ => spec(Syscall::Read, 3, PointerArgs::ARG1),
        SYS_WRITE => spec(Syscall::Write, 3, PointerArgs::ARG1),
        SYS_SEEK => spec(Syscall::Seek, 2, PointerArgs::empty()),
        SYS_TELL => spec(Syscall::Tell, 1, PointerArgs::empty()),
        SYS_CLOSE => spec(Syscall::Close, 1, PointerArgs::empty()),
        _ => return None,
    };
    Some(entry)
}
