//! Kernel limits for the syscall layer.

/// Console input descriptor.
pub const STDIN_FD: i32 = 0;

/// Console output descriptor.
pub const STDOUT_FD: i32 = 1;

/// First descriptor handed out by `open`; 0 and 1 belong to the console.
pub const FIRST_FILE_FD: i32 = 2;

/// Maximum number of files one process may hold open at once.
pub const MAX_OPEN_FILES: usize = 128;

/// Longest user string (including the NUL) the kernel will copy in.
pub const MAX_USER_STRING: usize = 4096;

/// Bounce buffer size for file reads and writes.
pub const IO_CHUNK: usize = 512;

/// Pid of the first process; pids are never reused.
pub const FIRST_PID: u32 = 1;

/// Line printed by `halt` before powering off.
pub const HALT_BANNER: &str = "HALT\n";
