//! System Call Handler
//!
//! Dispatches system calls and implements individual syscall handlers.
//!
//! # Security Considerations
//! - The syscall number and every argument slot are validated before use
//! - Pointer arguments are revalidated for the full length they access
//! - Unknown numbers and bad addresses end the caller with status -1
//! - Unknown descriptors are per-call failures, never fatal

use alloc::string::String;
use core::cmp;

use crate::config::{IO_CHUNK, STDIN_FD, STDOUT_FD};
use crate::drivers::Console;
use crate::error::Fatal;
use crate::fs::FileSystem;
use crate::kernel::{Kernel, Outcome};
use crate::mm::{UserAddr, UserMemory};
use crate::platform::Platform;
use crate::process::Pid;
use crate::trap::TrapFrame;

use super::args::{gate_pointers, marshal, read_syscall_number, SyscallArgs};
use super::table::{self, Syscall};
use super::validate::{read_user_string, validate_user_read, validate_user_write};

/// Failure sentinel returned in the result register (-1).
const FAILURE: u32 = u32::MAX;

/// What a handler asks the dispatcher to do with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Store a value in the result register and resume.
    Return(u32),
    /// Resume without touching the result register.
    NoValue,
    /// Terminate the caller with a status.
    Exit(i32),
    /// Power off.
    Halt,
}

impl Action {
    fn int(value: i32) -> Self {
        Self::Return(value as u32)
    }

    fn boolean(value: bool) -> Self {
        Self::Return(value as u32)
    }
}

impl<P: Platform> Kernel<P> {
    /// Handle a syscall trap of process `pid`.
    ///
    /// `frame` is the trapped register state; its stack pointer locates
    /// the syscall number and arguments in `memory`. On `Resume` the
    /// result (if the call has one) is in the frame's result register.
    pub fn syscall<M: UserMemory>(
        &self,
        pid: Pid,
        frame: &mut TrapFrame,
        memory: &mut M,
    ) -> Outcome {
        match self.dispatch(pid, frame.stack_pointer(), memory) {
            Ok(Action::Return(value)) => {
                frame.set_result(value);
                Outcome::Resume
            }
            Ok(Action::NoValue) => Outcome::Resume,
            Ok(Action::Exit(status)) => self.terminate(pid, status),
            Ok(Action::Halt) => self.halt(),
            Err(fatal) => {
                log::warn!("[SYSCALL] pid {}: {}", pid, fatal);
                self.terminate(pid, -1)
            }
        }
    }

    fn dispatch<M: UserMemory>(
        &self,
        pid: Pid,
        sp: UserAddr,
        memory: &mut M,
    ) -> Result<Action, Fatal> {
        let nr = read_syscall_number(memory, sp)?;
        let spec = table::lookup(nr).ok_or(Fatal::UnknownSyscall(nr))?;
        let args = marshal(memory, sp, spec.argc)?;
        gate_pointers(&args, spec.pointers)?;

        log::trace!("[SYSCALL] pid {} {:?} {:?}", pid, spec.call, args);

        match spec.call {
            Syscall::Halt => Ok(Action::Halt),
            Syscall::Exit => Ok(Action::Exit(args.int(0))),
            Syscall::Exec => self.sys_exec(pid, memory, &args),
            Syscall::Wait => Ok(Action::int(self.wait(pid, args.int(0)))),
            Syscall::Create => self.sys_create(memory, &args),
            Syscall::Remove => self.sys_remove(memory, &args),
            Syscall::Open => self.sys_open(pid, memory, &args),
            Syscall::Filesize => Ok(self.sys_filesize(pid, args.int(0))),
            Syscall::Read => self.sys_read(pid, memory, &args),
            Syscall::Write => self.sys_write(pid, memory, &args),
            Syscall::Seek => Ok(self.sys_seek(pid, args.int(0), args.uint(1))),
            Syscall::Tell => Ok(self.sys_tell(pid, args.int(0))),
            Syscall::Close => Ok(self.sys_close(pid, args.int(0))),
        }
    }

    /// exec(cmd_line) -> pid or -1
    fn sys_exec<M: UserMemory>(
        &self,
        pid: Pid,
        memory: &M,
        args: &SyscallArgs,
    ) -> Result<Action, Fatal> {
        let Some(cmd_line) = user_str(memory, args.addr(0))? else {
            return Ok(Action::int(-1));
        };
        Ok(Action::int(self.exec(pid, &cmd_line)))
    }

    /// create(path, initial_size) -> bool
    fn sys_create<M: UserMemory>(&self, memory: &M, args: &SyscallArgs) -> Result<Action, Fatal> {
        let Some(path) = user_str(memory, args.addr(0))? else {
            return Ok(Action::boolean(false));
        };
        let size = args.uint(1);
        Ok(Action::boolean(
            self.with_filesystem(|fs| fs.create(&path, size)),
        ))
    }

    /// remove(path) -> bool
    fn sys_remove<M: UserMemory>(&self, memory: &M, args: &SyscallArgs) -> Result<Action, Fatal> {
        let Some(path) = user_str(memory, args.addr(0))? else {
            return Ok(Action::boolean(false));
        };
        Ok(Action::boolean(self.with_filesystem(|fs| fs.remove(&path))))
    }

    /// open(path) -> fd or -1
    fn sys_open<M: UserMemory>(
        &self,
        pid: Pid,
        memory: &M,
        args: &SyscallArgs,
    ) -> Result<Action, Fatal> {
        let Some(path) = user_str(memory, args.addr(0))? else {
            return Ok(Action::int(-1));
        };
        let Some(table) = self.table(pid) else {
            return Ok(Action::int(-1));
        };

        let mut table = table.lock();
        let mut fs = self.fs.lock();
        let Some(file) = fs.open(&path) else {
            log::debug!("[SYSCALL] open: no such file {:?}", path);
            return Ok(Action::int(-1));
        };
        match table.add(file) {
            Ok(fd) => Ok(Action::int(fd)),
            Err((e, file)) => {
                log::warn!("[SYSCALL] open: pid {}: {}", pid, e);
                fs.close(file);
                Ok(Action::int(-1))
            }
        }
    }

    /// filesize(fd) -> size or -1
    fn sys_filesize(&self, pid: Pid, fd: i32) -> Action {
        let Some(table) = self.table(pid) else {
            return Action::int(-1);
        };
        let mut table = table.lock();
        match table.get(fd) {
            Ok(file) => Action::Return(self.fs.lock().length(file)),
            Err(_) => Action::int(-1),
        }
    }

    /// read(fd, buffer, size) -> bytes read or -1
    fn sys_read<M: UserMemory>(
        &self,
        pid: Pid,
        memory: &mut M,
        args: &SyscallArgs,
    ) -> Result<Action, Fatal> {
        let fd = args.int(0);
        let size = args.uint(2);
        let buffer = validate_user_write(args.addr(1), size as usize)?;

        match fd {
            STDIN_FD => {
                let console = self.platform.console();
                for offset in 0..buffer.len() {
                    let byte = console.read_byte();
                    buffer.copy_out(memory, offset, &[byte])?;
                }
                Ok(Action::Return(size))
            }
            STDOUT_FD => Ok(Action::int(-1)),
            _ => {
                let Some(table) = self.table(pid) else {
                    return Ok(Action::int(-1));
                };
                if !table.lock().contains(fd) {
                    return Ok(Action::int(-1));
                }

                let mut chunk = [0u8; IO_CHUNK];
                let mut done = 0;
                while done < buffer.len() {
                    let want = cmp::min(IO_CHUNK, buffer.len() - done);
                    let got = {
                        let mut table = table.lock();
                        let Ok(file) = table.get(fd) else {
                            break;
                        };
                        self.fs.lock().read(file, &mut chunk[..want])
                    };
                    buffer.copy_out(memory, done, &chunk[..got])?;
                    done += got;
                    if got < want {
                        break;
                    }
                }
                Ok(Action::Return(done as u32))
            }
        }
    }

    /// write(fd, buffer, size) -> bytes written or -1
    fn sys_write<M: UserMemory>(
        &self,
        pid: Pid,
        memory: &M,
        args: &SyscallArgs,
    ) -> Result<Action, Fatal> {
        let fd = args.int(0);
        let size = args.uint(2);
        let buffer = validate_user_read(args.addr(1), size as usize)?;

        match fd {
            STDOUT_FD => {
                let console = self.platform.console();
                let mut chunk = [0u8; IO_CHUNK];
                let mut done = 0;
                while done < buffer.len() {
                    let want = cmp::min(IO_CHUNK, buffer.len() - done);
                    buffer.copy_in(memory, done, &mut chunk[..want])?;
                    console.write_bytes(&chunk[..want]);
                    done += want;
                }
                Ok(Action::Return(size))
            }
            STDIN_FD => Ok(Action::int(-1)),
            _ => {
                let Some(table) = self.table(pid) else {
                    return Ok(Action::int(-1));
                };
                if !table.lock().contains(fd) {
                    return Ok(Action::int(-1));
                }

                let mut chunk = [0u8; IO_CHUNK];
                let mut done = 0;
                while done < buffer.len() {
                    let want = cmp::min(IO_CHUNK, buffer.len() - done);
                    buffer.copy_in(memory, done, &mut chunk[..want])?;
                    let put = {
                        let mut table = table.lock();
                        let Ok(file) = table.get(fd) else {
                            break;
                        };
                        self.fs.lock().write(file, &chunk[..want])
                    };
                    done += put;
                    if put < want {
                        break;
                    }
                }
                Ok(Action::Return(done as u32))
            }
        }
    }

    /// seek(fd, position)
    fn sys_seek(&self, pid: Pid, fd: i32, position: u32) -> Action {
        if let Some(table) = self.table(pid) {
            if let Ok(file) = table.lock().get(fd) {
                self.fs.lock().seek(file, position);
            }
        }
        Action::NoValue
    }

    /// tell(fd) -> position or u32::MAX
    fn sys_tell(&self, pid: Pid, fd: i32) -> Action {
        let Some(table) = self.table(pid) else {
            return Action::Return(FAILURE);
        };
        let mut table = table.lock();
        match table.get(fd) {
            Ok(file) => Action::Return(self.fs.lock().tell(file)),
            Err(_) => Action::Return(FAILURE),
        }
    }

    /// close(fd)
    fn sys_close(&self, pid: Pid, fd: i32) -> Action {
        let Some(table) = self.table(pid) else {
            return Action::NoValue;
        };
        let mut table = table.lock();
        match table.close(fd) {
            Ok(file) => self.fs.lock().close(file),
            Err(e) => log::debug!("[SYSCALL] close({}): {}", fd, e),
        }
        Action::NoValue
    }
}

/// Copy in a user string argument. `None` if it is not valid UTF-8.
fn user_str<M: UserMemory>(memory: &M, addr: UserAddr) -> Result<Option<String>, Fatal> {
    let bytes = read_user_string(memory, addr)?;
    Ok(String::from_utf8(bytes).ok())
}
