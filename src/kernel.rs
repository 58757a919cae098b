//! The kernel object tying the syscall layer together.
//!
//! # Ownership
//! - `registry`: family tree and handshakes, shared by parents and children
//! - `tables`: one descriptor table per process, only touched by its owner
//!   and by its own teardown
//! - `fs`: the filesystem behind the one global filesystem lock
//!
//! Lock order: descriptor table, then filesystem. User memory is never
//! accessed while either is held.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::sync::Arc;

use spin::Mutex;

use crate::drivers::Console;
use crate::error::LaunchError;
use crate::fs::FileSystem;
use crate::platform::Platform;
use crate::process::{FileDescriptorTable, LoadState, Pid, ProcessRecord, ProcessRegistry};

/// Open-file handle type of a platform's filesystem.
pub type FileOf<P> = <<P as Platform>::Fs as FileSystem>::File;

/// Descriptor table of one process, behind its own lock.
pub type SharedTable<P> = Arc<Mutex<FileDescriptorTable<FileOf<P>>>>;

/// What the trap glue must do after the kernel handled a trap.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Return to user mode; the result (if any) is in the trap frame.
    Resume,
    /// The process is gone; never resume its user context.
    Exited(i32),
    /// The machine is powering off.
    Halted,
}

/// The syscall layer of one machine.
pub struct Kernel<P: Platform> {
    pub(crate) platform: P,
    pub(crate) fs: Mutex<P::Fs>,
    pub(crate) registry: ProcessRegistry,
    pub(crate) tables: Mutex<BTreeMap<Pid, SharedTable<P>>>,
}

impl<P: Platform> Kernel<P> {
    /// Create a kernel over `platform`, owning `fs`.
    pub fn new(platform: P, fs: P::Fs) -> Self {
        Self {
            platform,
            fs: Mutex::new(fs),
            registry: ProcessRegistry::new(),
            tables: Mutex::new(BTreeMap::new()),
        }
    }

    /// The platform services.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The process registry.
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Run `f` with the filesystem lock held.
    pub fn with_filesystem<R>(&self, f: impl FnOnce(&mut P::Fs) -> R) -> R {
        f(&mut self.fs.lock())
    }

    /// Number of descriptors `pid` holds open, if it has a table.
    pub fn open_files(&self, pid: Pid) -> Option<usize> {
        self.table(pid).map(|table| table.lock().len())
    }

    pub(crate) fn table(&self, pid: Pid) -> Option<SharedTable<P>> {
        self.tables.lock().get(&pid).cloned()
    }

    /// Register the calling boot context as the parentless first process.
    ///
    /// The context is already running, so the process counts as loaded.
    pub fn adopt_initial(&self, name: &str) -> Result<Pid, LaunchError> {
        let name = process_name(name).ok_or(LaunchError::BadCommandLine)?;
        let record = self
            .registry
            .create(None, name)
            .map_err(|_| LaunchError::OutOfContexts)?;
        self.tables
            .lock()
            .insert(record.pid(), Arc::new(Mutex::new(FileDescriptorTable::new())));
        if let Err(e) = self.registry.signal_loaded(&record, true) {
            log::warn!("[PROCESS] pid {} load reported twice: {}", record.pid(), e);
        }
        log::info!("[PROCESS] adopted boot context as pid {} ({})", record.pid(), name);
        Ok(record.pid())
    }

    /// Launch the parentless first process from a command line.
    ///
    /// Does not wait for the load; the returned record lets boot code
    /// wait for load and exit itself.
    pub fn spawn_initial(&self, cmd_line: &str) -> Result<Arc<ProcessRecord>, LaunchError> {
        self.spawn(None, cmd_line)
    }

    /// Create, register and launch a process.
    fn spawn(
        &self,
        parent: Option<Pid>,
        cmd_line: &str,
    ) -> Result<Arc<ProcessRecord>, LaunchError> {
        let name = process_name(cmd_line).ok_or(LaunchError::BadCommandLine)?;
        let record = self.registry.create(parent, name).map_err(|e| {
            log::debug!("[PROCESS] cannot register {}: {}", name, e);
            LaunchError::OutOfContexts
        })?;
        let pid = record.pid();
        self.tables
            .lock()
            .insert(pid, Arc::new(Mutex::new(FileDescriptorTable::new())));

        if let Err(e) = self.platform.launch(pid, cmd_line) {
            log::debug!("[PROCESS] launch of pid {} failed: {}", pid, e);
            self.tables.lock().remove(&pid);
            self.registry.remove_child(&record);
            return Err(e);
        }
        Ok(record)
    }

    /// Start a child process and wait until its image is built.
    ///
    /// Returns the child's pid, or -1 if it could not be launched or its
    /// load failed. The child's load state is never Pending on return.
    pub fn exec(&self, parent: Pid, cmd_line: &str) -> i32 {
        let record = match self.spawn(Some(parent), cmd_line) {
            Ok(record) => record,
            Err(_) => return -1,
        };
        match record.wait_loaded() {
            LoadState::Succeeded => record.pid().as_u32() as i32,
            _ => {
                // The caller never learns the pid, so nobody can reap it.
                self.registry.abandon_child(&record);
                -1
            }
        }
    }

    /// Report the load result of `pid`, from the child's own context.
    ///
    /// On failure the process is torn down with status -1 and the
    /// returned outcome is `Exited`; the context must not enter user mode.
    pub fn finish_load(&self, pid: Pid, success: bool) -> Outcome {
        let Some(record) = self.registry.lookup(pid) else {
            log::warn!("[PROCESS] load report for unknown pid {}", pid);
            return Outcome::Exited(-1);
        };
        if let Err(e) = self.registry.signal_loaded(&record, success) {
            log::warn!("[PROCESS] pid {} load reported twice: {}", pid, e);
        }
        if success {
            Outcome::Resume
        } else {
            self.terminate(pid, -1)
        }
    }

    /// Wait for direct child `pid` and consume its exit status.
    ///
    /// -1 if `pid` is not a registered child of `parent` or was already
    /// waited for.
    pub fn wait(&self, parent: Pid, pid: i32) -> i32 {
        if pid < 0 {
            return -1;
        }
        let child = match self.registry.get_child(parent, Pid::new(pid as u32)) {
            Ok(child) => child,
            Err(e) => {
                log::debug!("[PROCESS] pid {} cannot wait for {}: {}", parent, pid, e);
                return -1;
            }
        };
        let status = child.wait_exited();
        self.registry.remove_child(&child);
        status
    }

    /// Terminate `pid` after a fault or bad trap.
    pub fn kill(&self, pid: Pid) -> Outcome {
        log::warn!("[PROCESS] killing pid {}", pid);
        self.terminate(pid, -1)
    }

    /// Tear down `pid` with `status`.
    ///
    /// Order: descriptors released, exit line printed, children detached,
    /// then the exit signal raised, so a waiting parent sees a fully torn
    /// down child whose printed status matches the one it receives.
    pub fn terminate(&self, pid: Pid, status: i32) -> Outcome {
        let Some(record) = self.registry.lookup(pid) else {
            log::warn!("[PROCESS] terminate of unknown pid {}", pid);
            return Outcome::Exited(status);
        };
        if !record.begin_exit() {
            return Outcome::Exited(record.exit_status().unwrap_or(status));
        }

        let table = self.tables.lock().remove(&pid);
        if let Some(table) = table {
            let files = table.lock().close_all();
            if !files.is_empty() {
                let mut fs = self.fs.lock();
                for file in files {
                    fs.close(file);
                }
            }
        }

        // Lowercase "exit(status)", the form test harnesses match on,
        // rather than the older "EXIT (status)" spelling.
        let line = format!("{}: exit({})\n", record.name(), status);
        self.platform.console().write_bytes(line.as_bytes());

        self.registry.release_children(&record);
        if let Err(e) = self.registry.signal_exited(&record, status) {
            log::warn!("[PROCESS] pid {} exit signaled twice: {}", pid, e);
        }
        log::info!("[PROCESS] pid {} exited with status {}", pid, status);
        Outcome::Exited(status)
    }

    /// Print the halt banner and power off.
    pub fn halt(&self) -> Outcome {
        self.platform
            .console()
            .write_bytes(crate::config::HALT_BANNER.as_bytes());
        log::info!("[SYSCALL] halt");
        self.platform.power_off();
        Outcome::Halted
    }
}

/// Process name: first whitespace-separated word of a command line.
pub fn process_name(cmd_line: &str) -> Option<&str> {
    cmd_line.split_whitespace().next()
}
