//! ARM64 Trap Glue
//!
//! Decodes synchronous exceptions taken from user mode and routes them
//! into the kernel: SVC becomes a syscall, aborts and anything else kill
//! the faulting process.
//!
//! # Exception Levels
//! - EL0: User processes
//! - EL1: Kernel (where we run)
//!
//! The assembly vectors save a [`TrapFrame`], look up the current pid and
//! call [`handle_lower_el`]; the returned [`Outcome`] tells them whether
//! to `eret` back to user mode or to switch away for good.

use crate::kernel::{Kernel, Outcome};
use crate::mm::{UserAddr, UserMemory};
use crate::platform::Platform;
use crate::process::Pid;

/// Register holding a syscall's result (x0).
pub const RESULT_REG: usize = 0;

/// Register state saved on trap entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// General purpose registers x0-x30
    pub gpr: [u64; 31],
    /// User stack pointer (SP_EL0)
    pub sp: u64,
    /// Exception Link Register (return address)
    pub elr: u64,
    /// Saved Program Status Register
    pub spsr: u64,
    /// Exception Syndrome Register
    pub esr: u64,
    /// Fault Address Register
    pub far: u64,
}

impl TrapFrame {
    /// Frame of an `svc` trapped with user stack pointer `sp`.
    pub fn for_syscall(sp: UserAddr) -> Self {
        Self {
            sp: sp.as_usize() as u64,
            esr: (ExceptionClass::SvcAarch64 as u64) << 26,
            ..Self::default()
        }
    }

    /// The trapped user stack pointer.
    #[inline]
    pub fn stack_pointer(&self) -> UserAddr {
        UserAddr::new(self.sp as usize)
    }

    /// Low 32 bits of the result register.
    #[inline]
    pub fn result(&self) -> u32 {
        self.gpr[RESULT_REG] as u32
    }

    /// Store a syscall result. The upper half is cleared.
    #[inline]
    pub fn set_result(&mut self, value: u32) {
        self.gpr[RESULT_REG] = u64::from(value);
    }

    /// Exception class recorded in ESR.
    #[inline]
    pub fn class(&self) -> ExceptionClass {
        ExceptionClass::from(self.esr)
    }
}

/// Exception class extracted from ESR_EL1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionClass {
    Unknown = 0x00,
    SvcAarch64 = 0x15,
    InstructionAbortLowerEl = 0x20,
    InstructionAbortSameEl = 0x21,
    DataAbortLowerEl = 0x24,
    DataAbortSameEl = 0x25,
    Other = 0xFF,
}

impl From<u64> for ExceptionClass {
    fn from(esr: u64) -> Self {
        let ec = ((esr >> 26) & 0x3F) as u8;
        match ec {
            0x00 => ExceptionClass::Unknown,
            0x15 => ExceptionClass::SvcAarch64,
            0x20 => ExceptionClass::InstructionAbortLowerEl,
            0x21 => ExceptionClass::InstructionAbortSameEl,
            0x24 => ExceptionClass::DataAbortLowerEl,
            0x25 => ExceptionClass::DataAbortSameEl,
            _ => ExceptionClass::Other,
        }
    }
}

/// Handle a synchronous exception from user mode.
pub fn handle_lower_el<P: Platform, M: UserMemory>(
    kernel: &Kernel<P>,
    pid: Pid,
    ctx: &mut TrapFrame,
    memory: &mut M,
) -> Outcome {
    let ec = ctx.class();
    match ec {
        ExceptionClass::SvcAarch64 => kernel.syscall(pid, ctx, memory),
        ExceptionClass::DataAbortLowerEl | ExceptionClass::InstructionAbortLowerEl => {
            log::warn!(
                "[EXCEPTION] pid {} user abort at 0x{:016x}, ESR 0x{:016x}",
                pid,
                ctx.far,
                ctx.esr
            );
            kernel.kill(pid)
        }
        _ => {
            log::warn!(
                "[EXCEPTION] pid {} unhandled {:?}, ESR 0x{:016x}",
                pid,
                ec,
                ctx.esr
            );
            kernel.kill(pid)
        }
    }
}

/// Handle a synchronous exception taken in kernel mode.
///
/// A data abort on a user address while servicing `pid` is a bad user
/// pointer that slipped past the numeric bounds check (an unmapped user
/// page): the process is killed. Anything else is a kernel bug and
/// `None` is returned for the caller to panic on.
pub fn handle_same_el<P: Platform>(
    kernel: &Kernel<P>,
    pid: Pid,
    ctx: &TrapFrame,
) -> Option<Outcome> {
    let ec = ctx.class();
    if ec == ExceptionClass::DataAbortSameEl && UserAddr::new(ctx.far as usize).is_user() {
        log::warn!(
            "[EXCEPTION] pid {} kernel access to user page 0x{:016x} faulted",
            pid,
            ctx.far
        );
        return Some(kernel.kill(pid));
    }

    log::error!("[EXCEPTION] kernel exception {:?}", ec);
    log::error!("[EXCEPTION] ESR: 0x{:016x}", ctx.esr);
    log::error!("[EXCEPTION] ELR: 0x{:016x}", ctx.elr);
    log::error!("[EXCEPTION] FAR: 0x{:016x}", ctx.far);
    None
}
