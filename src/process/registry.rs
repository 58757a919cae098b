//! Process Registry
//!
//! Tracks every live or zombie process: who created it, how its image load
//! went, and how it exited.
//!
//! # Design
//! - Records are indexed by pid; each record lists its direct children
//! - The parent/child link fields (`parent`, `children`) are only mutated
//!   while the registry lock is held, so every teardown decision sees a
//!   consistent family tree. Lock order: registry, then record fields
//! - The load and exit handshakes are one-shot completions written by the
//!   child and read by the parent
//!
//! # Lifetime of a record
//! ```text
//!   create ──► running ──► exited (zombie) ──► reaped by wait
//!                 │              │
//!                 │              └──► freed at once if no parent remains
//!                 └──► orphaned when the parent exits first
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spin::Mutex;

use super::completion::Completion;
use crate::config::FIRST_PID;
use crate::error::RegistryError;

/// A process identifier.
///
/// Pids are handed out in increasing order and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Create a pid from its raw value.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of building a process's initial image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The child has not reported yet.
    Pending,
    /// The image was built; the child is schedulable.
    Succeeded,
    /// The image could not be built; the child is about to exit.
    Failed,
}

/// Lifecycle record of one process.
pub struct ProcessRecord {
    pid: Pid,
    name: String,
    parent: Mutex<Option<Pid>>,
    children: Mutex<Vec<Pid>>,
    loaded: Completion<bool>,
    exited: Completion<i32>,
    exiting: AtomicBool,
}

impl ProcessRecord {
    fn new(pid: Pid, parent: Option<Pid>, name: String) -> Self {
        Self {
            pid,
            name,
            parent: Mutex::new(parent),
            children: Mutex::new(Vec::new()),
            loaded: Completion::new(),
            exited: Completion::new(),
            exiting: AtomicBool::new(false),
        }
    }

    /// The process identifier.
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The process name (first word of its command line).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The creating process, if it is still around to collect our status.
    pub fn parent(&self) -> Option<Pid> {
        *self.parent.lock()
    }

    /// Snapshot of the registered children, in creation order.
    pub fn children(&self) -> Vec<Pid> {
        self.children.lock().clone()
    }

    /// Current load state, without blocking.
    pub fn load_state(&self) -> LoadState {
        match self.loaded.peek() {
            None => LoadState::Pending,
            Some(true) => LoadState::Succeeded,
            Some(false) => LoadState::Failed,
        }
    }

    /// Block until the child reports its load result.
    ///
    /// Never returns `Pending`.
    pub fn wait_loaded(&self) -> LoadState {
        if *self.loaded.wait() {
            LoadState::Succeeded
        } else {
            LoadState::Failed
        }
    }

    /// Exit status, if the process has fully terminated.
    pub fn exit_status(&self) -> Option<i32> {
        self.exited.peek().copied()
    }

    /// Block until the process has fully terminated.
    pub fn wait_exited(&self) -> i32 {
        *self.exited.wait()
    }

    /// Check whether the process has fully terminated.
    #[inline]
    pub fn has_exited(&self) -> bool {
        self.exited.is_complete()
    }

    /// Claim the teardown of this process. True for the first caller only.
    pub fn begin_exit(&self) -> bool {
        !self.exiting.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("parent", &self.parent())
            .field("load", &self.load_state())
            .field("exit", &self.exit_status())
            .finish()
    }
}

/// Registry of all process records.
pub struct ProcessRegistry {
    records: Mutex<BTreeMap<Pid, Arc<ProcessRecord>>>,
    next_pid: AtomicU32,
}

impl ProcessRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_pid: AtomicU32::new(FIRST_PID),
        }
    }

    /// Allocate a record for a new process and link it to its parent.
    ///
    /// The child is discoverable through `get_child` before this returns,
    /// i.e. before the child's first instruction can run.
    pub fn create(
        &self,
        parent: Option<Pid>,
        name: &str,
    ) -> Result<Arc<ProcessRecord>, RegistryError> {
        let mut records = self.records.lock();
        if let Some(ppid) = parent {
            let parent_record = records.get(&ppid).ok_or(RegistryError::NoSuchProcess)?;
            if parent_record.has_exited() {
                return Err(RegistryError::NoSuchProcess);
            }
        }

        let pid = Pid(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(ProcessRecord::new(pid, None, String::from(name)));
        records.insert(pid, record.clone());
        if let Some(ppid) = parent {
            Self::link(&records, ppid, pid)?;
        }

        log::debug!("[PROCESS] created pid {} ({}) parent {:?}", pid, name, parent);
        Ok(record)
    }

    /// Append `child` to `parent`'s children.
    pub fn register_child(&self, parent: Pid, child: Pid) -> Result<(), RegistryError> {
        let records = self.records.lock();
        Self::link(&records, parent, child)
    }

    fn link(
        records: &BTreeMap<Pid, Arc<ProcessRecord>>,
        parent: Pid,
        child: Pid,
    ) -> Result<(), RegistryError> {
        let parent_record = records.get(&parent).ok_or(RegistryError::NoSuchProcess)?;
        let child_record = records.get(&child).ok_or(RegistryError::NoSuchProcess)?;

        let mut children = parent_record.children.lock();
        if !children.contains(&child) {
            children.push(child);
        }
        *child_record.parent.lock() = Some(parent);
        Ok(())
    }

    /// Find `pid` among the direct, still-registered children of `parent`.
    pub fn get_child(&self, parent: Pid, pid: Pid) -> Result<Arc<ProcessRecord>, RegistryError> {
        let records = self.records.lock();
        let parent_record = records.get(&parent).ok_or(RegistryError::NoSuchProcess)?;
        if !parent_record.children.lock().contains(&pid) {
            return Err(RegistryError::NotAChild);
        }
        records.get(&pid).cloned().ok_or(RegistryError::NotAChild)
    }

    /// Look up any record by pid.
    pub fn lookup(&self, pid: Pid) -> Option<Arc<ProcessRecord>> {
        self.records.lock().get(&pid).cloned()
    }

    /// Detach a record from its parent and free it.
    ///
    /// After this the pid is unknown to `get_child`, so a repeated wait on
    /// it fails.
    pub fn remove_child(&self, record: &ProcessRecord) {
        let mut records = self.records.lock();
        let parent = record.parent.lock().take();
        if let Some(parent_record) = parent.and_then(|ppid| records.get(&ppid)) {
            parent_record.children.lock().retain(|&pid| pid != record.pid);
        }
        records.remove(&record.pid);
        log::debug!("[PROCESS] reaped pid {}", record.pid);
    }

    /// Detach a child its parent will never wait for.
    ///
    /// An exited child is freed now; a running one is orphaned and frees
    /// itself in `signal_exited`.
    pub fn abandon_child(&self, record: &ProcessRecord) {
        let mut records = self.records.lock();
        let parent = record.parent.lock().take();
        if let Some(parent_record) = parent.and_then(|ppid| records.get(&ppid)) {
            parent_record.children.lock().retain(|&pid| pid != record.pid);
        }
        if record.has_exited() {
            records.remove(&record.pid);
        }
        log::debug!("[PROCESS] pid {} abandoned by {:?}", record.pid, parent);
    }

    /// Record the child's load result and release the waiting parent.
    ///
    /// A second report for the same record is rejected.
    pub fn signal_loaded(&self, record: &ProcessRecord, success: bool) -> Result<(), RegistryError> {
        record.loaded.complete(success)?;
        log::debug!(
            "[PROCESS] pid {} load {}",
            record.pid,
            if success { "succeeded" } else { "failed" }
        );
        Ok(())
    }

    /// Record the exit status and release the waiting parent.
    ///
    /// A process nobody can wait for any more is freed on the spot.
    pub fn signal_exited(&self, record: &ProcessRecord, status: i32) -> Result<(), RegistryError> {
        record.exited.complete(status)?;

        let mut records = self.records.lock();
        if record.parent.lock().is_none() {
            records.remove(&record.pid);
            log::debug!("[PROCESS] pid {} exited without a waiter, freed", record.pid);
        }
        Ok(())
    }

    /// Drop the family links of a terminating parent.
    ///
    /// Children that already exited are freed and their status discarded;
    /// running children become orphans and free themselves when they
    /// exit. Returns the number of zombies discarded.
    pub fn release_children(&self, parent: &ProcessRecord) -> usize {
        let mut records = self.records.lock();
        let children = core::mem::take(&mut *parent.children.lock());
        let mut discarded = 0;
        for pid in children {
            let Some(child) = records.get(&pid).cloned() else {
                continue;
            };
            *child.parent.lock() = None;
            if child.has_exited() {
                records.remove(&pid);
                discarded += 1;
            }
        }
        if discarded > 0 {
            log::debug!(
                "[PROCESS] pid {} discarded {} unwaited children",
                parent.pid,
                discarded
            );
        }
        discarded
    }

    /// Number of records (live and zombie).
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.lock().values()).finish()
    }
}
