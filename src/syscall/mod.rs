//! System Call Interface
//!
//! Provides the syscall boundary for user-mode processes.
//!
//! # Security Model
//! - Whitelist approach: only numbers in the dispatch table are accepted
//! - All parameters are validated before use
//! - Invalid addresses end the caller, never the kernel
//!
//! # Calling Convention
//! The syscall number is the word at the user stack pointer; argument
//! `i` is the word `i + 1` slots above it. Results go in x0.
//!
//! # Current Syscalls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmd_line) -> pid
//! - 3: wait(pid) -> status
//! - 5: create(path, size) -> bool
//! - 6: remove(path) -> bool
//! - 7: open(path) -> fd
//! - 8: filesize(fd) -> size
//! - 9: read(fd, buf, size) -> count
//! - 10: write(fd, buf, size) -> count
//! - 11: seek(fd, pos)
//! - 12: tell(fd) -> pos
//! - 13: close(fd)

pub mod args;
mod handler;
pub mod table;
pub mod validate;

pub use table::numbers;
pub use validate::{UserBuffer, UserBufferMut};
