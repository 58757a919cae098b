//! Process lifecycle state owned by the syscall layer
//!
//! The scheduler owns execution contexts; this module owns everything the
//! syscall layer needs to know about a process, keyed by pid:
//! - `ProcessRegistry`: family tree plus load/exit handshakes
//! - `FileDescriptorTable`: open files of one process
//! - `Completion`: the one-shot signal behind both handshakes

pub mod completion;
pub mod fd_table;
pub mod registry;

pub use completion::Completion;
pub use fd_table::FileDescriptorTable;
pub use registry::{LoadState, Pid, ProcessRecord, ProcessRegistry};
