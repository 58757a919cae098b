//! Host-side fixtures for kernel tests.
//!
//! `boot` builds a kernel over an in-memory filesystem and a recording
//! console. Launched processes run on their own std threads, driven by a
//! [`Script`]; tests drive a process by hand through [`UserProcess`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use spin::Mutex;

use crate::drivers::Console;
use crate::error::LaunchError;
use crate::fs::FileSystem;
use crate::kernel::{process_name, Kernel, Outcome};
use crate::mm::{ArenaMemory, Fault, UserAddr, UserMemory, PAGE_SIZE, PHYS_BASE, USER_BASE, WORD_SIZE};
use crate::platform::Platform;
use crate::process::Pid;
use crate::syscall::numbers::{SYS_EXIT, SYS_WRITE};
use crate::trap::TrapFrame;

/// Flat in-memory filesystem.
#[derive(Debug, Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
    open: usize,
}

/// Open handle into a [`MemFs`].
#[derive(Debug)]
pub struct MemFile {
    name: String,
    pos: u32,
}

impl MemFs {
    /// Create or replace a file.
    pub fn insert(&mut self, name: &str, data: &[u8]) {
        self.files.insert(String::from(name), data.to_vec());
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open
    }
}

impl FileSystem for MemFs {
    type File = MemFile;

    fn create(&mut self, path: &str, initial_size: u32) -> bool {
        if path.is_empty() || self.files.contains_key(path) {
            return false;
        }
        self.files
            .insert(String::from(path), vec![0; initial_size as usize]);
        true
    }

    fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    fn open(&mut self, path: &str) -> Option<MemFile> {
        self.files.contains_key(path).then(|| {
            self.open += 1;
            MemFile {
                name: String::from(path),
                pos: 0,
            }
        })
    }

    fn length(&mut self, file: &MemFile) -> u32 {
        self.files.get(&file.name).map_or(0, |data| data.len() as u32)
    }

    fn read(&mut self, file: &mut MemFile, buf: &mut [u8]) -> usize {
        let Some(data) = self.files.get(&file.name) else {
            return 0;
        };
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n as u32;
        n
    }

    fn write(&mut self, file: &mut MemFile, bytes: &[u8]) -> usize {
        let Some(data) = self.files.get_mut(&file.name) else {
            return 0;
        };
        let start = file.pos as usize;
        if data.len() < start + bytes.len() {
            data.resize(start + bytes.len(), 0);
        }
        data[start..start + bytes.len()].copy_from_slice(bytes);
        file.pos += bytes.len() as u32;
        bytes.len()
    }

    fn seek(&mut self, file: &mut MemFile, position: u32) {
        file.pos = position;
    }

    fn tell(&mut self, file: &MemFile) -> u32 {
        file.pos
    }

    fn close(&mut self, _file: MemFile) {
        self.open -= 1;
    }
}

/// Console that records output and replays queued input.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    output: Mutex<Vec<u8>>,
    input: Mutex<VecDeque<u8>>,
}

impl RecordingConsole {
    /// Everything written so far.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }

    /// Queue bytes for `read_byte`.
    pub fn feed(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
    }
}

impl Console for RecordingConsole {
    fn write_bytes(&self, bytes: &[u8]) {
        self.output.lock().extend_from_slice(bytes);
    }

    fn read_byte(&self) -> u8 {
        loop {
            if let Some(byte) = self.input.lock().pop_front() {
                return byte;
            }
            thread::yield_now();
        }
    }
}

type Program = Arc<dyn Fn(&mut UserProcess<'_>) -> i32 + Send + Sync>;

fn program(f: impl Fn(&mut UserProcess<'_>) -> i32 + Send + Sync + 'static) -> Program {
    Arc::new(f)
}

/// How a launched process behaves.
#[derive(Clone)]
pub enum Script {
    /// `launch` itself fails; no context is created.
    Refuse,
    /// The context starts but its image does not load.
    FailLoad,
    /// Load after `delay`, then run `program` and exit with its result.
    Run { delay: Duration, program: Program },
}

impl Script {
    pub fn refuse() -> Self {
        Self::Refuse
    }

    pub fn fail_load() -> Self {
        Self::FailLoad
    }

    /// Load at once and exit with `status`.
    pub fn exit_with(status: i32) -> Self {
        Self::Run {
            delay: Duration::ZERO,
            program: program(move |_| status),
        }
    }

    /// Load after `millis` milliseconds, then exit with 0.
    pub fn slow_load(millis: u64) -> Self {
        Self::Run {
            delay: Duration::from_millis(millis),
            program: program(|_| 0),
        }
    }

    /// Keep the load behavior, exit with `status`.
    pub fn then_exit(self, status: i32) -> Self {
        match self {
            Self::Run { delay, .. } => Self::Run {
                delay,
                program: program(move |_| status),
            },
            other => other,
        }
    }

    /// Load, then hand the kernel a buffer in kernel space.
    pub fn bad_write() -> Self {
        Self::Run {
            delay: Duration::ZERO,
            program: program(|p| {
                p.call(SYS_WRITE, &[1, PHYS_BASE as u32, 4]);
                0
            }),
        }
    }
}

/// Platform whose execution contexts are host threads.
pub struct TestPlatform {
    kernel: Weak<Kernel<TestPlatform>>,
    console: RecordingConsole,
    programs: BTreeMap<String, Script>,
    powered_off: AtomicBool,
}

impl TestPlatform {
    pub fn output(&self) -> String {
        self.console.output()
    }

    /// Poll until the console shows exactly `expected`.
    pub fn wait_for_output(&self, expected: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.output() != expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(self.output(), expected);
    }

    pub fn feed_input(&self, bytes: &[u8]) {
        self.console.feed(bytes);
    }

    pub fn powered_off(&self) -> bool {
        self.powered_off.load(Ordering::Acquire)
    }
}

impl Platform for TestPlatform {
    type Fs = MemFs;
    type Console = RecordingConsole;

    fn console(&self) -> &RecordingConsole {
        &self.console
    }

    fn launch(&self, pid: Pid, cmd_line: &str) -> Result<(), LaunchError> {
        let name = process_name(cmd_line).ok_or(LaunchError::BadCommandLine)?;
        let script = self.programs.get(name).cloned();
        if matches!(script, Some(Script::Refuse)) {
            return Err(LaunchError::OutOfContexts);
        }
        let kernel = self.kernel.upgrade().ok_or(LaunchError::OutOfContexts)?;
        thread::spawn(move || run_process(&kernel, pid, script));
        Ok(())
    }

    fn power_off(&self) {
        self.powered_off.store(true, Ordering::Release);
    }
}

fn run_process(kernel: &Kernel<TestPlatform>, pid: Pid, script: Option<Script>) {
    let Some(Script::Run { delay, program }) = script else {
        let _ = kernel.finish_load(pid, false);
        return;
    };
    thread::sleep(delay);
    if kernel.finish_load(pid, true) != Outcome::Resume {
        return;
    }
    let mut process = UserProcess::attach(kernel, pid);
    let status = program(&mut process);
    if process.outcome().is_none() {
        process.call(SYS_EXIT, &[status as u32]);
    }
}

/// Build a kernel whose loader knows `programs` by name.
pub fn boot(programs: &[(&str, Script)]) -> Arc<Kernel<TestPlatform>> {
    let programs: BTreeMap<String, Script> = programs
        .iter()
        .map(|(name, script)| (String::from(*name), script.clone()))
        .collect();
    Arc::new_cyclic(|weak| {
        Kernel::new(
            TestPlatform {
                kernel: weak.clone(),
                console: RecordingConsole::default(),
                programs,
                powered_off: AtomicBool::new(false),
            },
            MemFs::default(),
        )
    })
}

const DATA_SIZE: usize = 64 * 1024;
const STACK_SIZE: usize = 16 * 1024;
/// Where `prepare` puts the syscall number.
const FRAME_SP: usize = PHYS_BASE - 64;

/// Address space of a test process: a data segment at `USER_BASE` whose
/// first page is read-only text, and a stack ending at `PHYS_BASE`.
#[derive(Debug)]
pub struct ProcessMemory {
    data: ArenaMemory,
    stack: ArenaMemory,
}

impl ProcessMemory {
    fn new() -> Self {
        Self {
            data: ArenaMemory::new(UserAddr::new(USER_BASE), DATA_SIZE).with_read_only(PAGE_SIZE),
            stack: ArenaMemory::new(UserAddr::new(PHYS_BASE - STACK_SIZE), STACK_SIZE),
        }
    }

    fn region(&self, addr: UserAddr) -> &ArenaMemory {
        if addr >= self.stack.base() {
            &self.stack
        } else {
            &self.data
        }
    }
}

impl UserMemory for ProcessMemory {
    fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), Fault> {
        self.region(addr).read(addr, buf)
    }

    fn write(&mut self, addr: UserAddr, data: &[u8]) -> Result<(), Fault> {
        if addr >= self.stack.base() {
            self.stack.write(addr, data)
        } else {
            self.data.write(addr, data)
        }
    }
}

/// A process driven by hand: owns its memory and issues syscalls.
pub struct UserProcess<'k> {
    kernel: &'k Kernel<TestPlatform>,
    pid: Pid,
    memory: ProcessMemory,
    brk: usize,
    outcome: Option<Outcome>,
}

impl<'k> UserProcess<'k> {
    /// Register a fresh parentless process and drive it.
    pub fn adopt(kernel: &'k Kernel<TestPlatform>, name: &str) -> Self {
        let pid = kernel.adopt_initial(name).unwrap();
        Self::attach(kernel, pid)
    }

    /// Drive an already registered process.
    pub fn attach(kernel: &'k Kernel<TestPlatform>, pid: Pid) -> Self {
        Self {
            kernel,
            pid,
            memory: ProcessMemory::new(),
            brk: USER_BASE + PAGE_SIZE,
            outcome: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn memory(&mut self) -> &mut ProcessMemory {
        &mut self.memory
    }

    /// How the process ended, if it did.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Reserve `len` zeroed bytes in the data segment.
    pub fn alloc(&mut self, len: usize) -> u32 {
        let addr = self.brk;
        self.brk += len.max(1);
        assert!(self.brk <= USER_BASE + DATA_SIZE, "test data segment full");
        addr as u32
    }

    /// Place `data` in the data segment.
    pub fn bytes(&mut self, data: &[u8]) -> u32 {
        let addr = self.alloc(data.len());
        self.memory
            .write(UserAddr::new(addr as usize), data)
            .unwrap();
        addr
    }

    /// Place a NUL-terminated string in the data segment.
    pub fn string(&mut self, s: &str) -> u32 {
        let mut raw = s.as_bytes().to_vec();
        raw.push(0);
        self.bytes(&raw)
    }

    /// Read back `len` bytes.
    pub fn load(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.memory
            .read(UserAddr::new(addr as usize), &mut out)
            .unwrap();
        out
    }

    /// Push a syscall frame on the stack and return the trapped registers.
    pub fn prepare(&mut self, nr: u32, args: &[u32]) -> TrapFrame {
        let sp = UserAddr::new(FRAME_SP);
        for (i, word) in std::iter::once(nr).chain(args.iter().copied()).enumerate() {
            let slot = sp.slot(i).unwrap();
            self.memory.write(slot, &word.to_le_bytes()).unwrap();
        }
        TrapFrame::for_syscall(sp)
    }

    /// Issue a syscall. `None` once the process no longer runs.
    pub fn call(&mut self, nr: u32, args: &[u32]) -> Option<u32> {
        let mut frame = self.prepare(nr, args);
        match self.trap(&mut frame) {
            Outcome::Resume => Some(frame.result()),
            _ => None,
        }
    }

    /// Trap with an arbitrary stack pointer.
    pub fn trap_at(&mut self, sp: usize) -> Outcome {
        let mut frame = TrapFrame::for_syscall(UserAddr::new(sp));
        self.trap(&mut frame)
    }

    /// Trap with `nr` in the topmost stack word, leaving no room for
    /// arguments below `PHYS_BASE`.
    pub fn trap_with_top_number(&mut self, nr: u32) -> Outcome {
        let sp = UserAddr::new(PHYS_BASE - WORD_SIZE);
        self.memory.write(sp, &nr.to_le_bytes()).unwrap();
        self.trap_at(sp.as_usize())
    }

    fn trap(&mut self, frame: &mut TrapFrame) -> Outcome {
        assert!(self.outcome.is_none(), "pid {} already ended", self.pid);
        let outcome = self.kernel.syscall(self.pid, frame, &mut self.memory);
        if outcome != Outcome::Resume {
            self.outcome = Some(outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memfs_positions() {
        let mut fs = MemFs::default();
        assert!(fs.create("a", 4));
        let mut f = fs.open("a").unwrap();
        assert_eq!(fs.write(&mut f, b"xy"), 2);
        assert_eq!(fs.length(&f), 4);
        fs.seek(&mut f, 1);
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(&mut f, &mut buf), 3);
        assert_eq!(&buf[..3], b"y\0\0");
        fs.close(f);
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_process_memory_layout() {
        let mut memory = ProcessMemory::new();
        assert!(memory.write(UserAddr::new(USER_BASE), b"x").is_err());
        assert!(memory.write(UserAddr::new(PHYS_BASE - 1), b"x").is_ok());
        assert!(memory.read_byte(UserAddr::new(PHYS_BASE - STACK_SIZE - 1)).is_err());
    }
}
