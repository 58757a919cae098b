//! Services the syscall layer consumes from the rest of the kernel.

use crate::drivers::Console;
use crate::error::LaunchError;
use crate::fs::FileSystem;
use crate::process::Pid;

/// Scheduler, loader, console and power control, as one capability set.
pub trait Platform: Send + Sync {
    /// Filesystem the file syscalls delegate to.
    type Fs: FileSystem;
    /// Console device behind descriptors 0 and 1.
    type Console: Console;

    /// The console device.
    fn console(&self) -> &Self::Console;

    /// Create an execution context for the already-registered process
    /// `pid`.
    ///
    /// The new context builds the image described by `cmd_line` and must
    /// report the result exactly once through
    /// [`Kernel::finish_load`](crate::Kernel::finish_load) before running
    /// user code. An error means the context was never created.
    fn launch(&self, pid: Pid, cmd_line: &str) -> Result<(), LaunchError>;

    /// Power the machine down. Does not return on real hardware.
    fn power_off(&self);
}
