//! PL011 UART Driver for QEMU virt machine
//!
//! Backs the console device: polled byte output for descriptor 1 and the
//! exit line, polled byte input for descriptor 0.
//!
//! # Memory Map (QEMU virt)
//! - Base address: 0x0900_0000
//! - Register size: 0x1000 bytes
//!
//! # Security Considerations
//! - Unsafe code is limited to the two MMIO accessors
//! - Uses spinlock for thread-safe access

use core::fmt::{self, Write};
use spin::Mutex;

use super::console::Console;

/// QEMU virt machine PL011 UART base address
pub const QEMU_VIRT_UART_BASE: usize = 0x0900_0000;

/// PL011 Register offsets
mod regs {
    /// Data Register - read/write data
    pub const DR: usize = 0x00;
    /// Flag Register - status flags
    pub const FR: usize = 0x18;
}

/// Flag Register bits
mod flags {
    /// Receive FIFO empty
    pub const RXFE: u32 = 1 << 4;
    /// Transmit FIFO full
    pub const TXFF: u32 = 1 << 5;
}

/// PL011 UART driver
pub struct Uart {
    base: usize,
    initialized: bool,
}

impl Uart {
    /// Create a new UART instance (not yet initialized)
    pub const fn new(base: usize) -> Self {
        Self {
            base,
            initialized: false,
        }
    }

    /// Initialize the UART
    ///
    /// # Safety
    /// - Must only be called once
    /// - `base` must point at a PL011 register block that stays mapped
    ///
    /// SAFETY AUDIT: 2025-01-04
    /// - Base address 0x0900_0000 is guaranteed by QEMU virt machine specification
    pub unsafe fn init(&mut self) {
        // PL011 is already initialized by QEMU, just mark as ready
        self.initialized = true;
    }

    #[inline]
    fn read_reg(&self, offset: usize) -> u32 {
        // SAFETY: Base address was vouched for in init(); offsets are
        // register offsets inside the 4 KiB block.
        // Audited: 2025-01-04
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write_reg(&self, offset: usize, value: u32) {
        // SAFETY: Same as read_reg
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Write a single byte to the UART
    fn write_byte(&self, byte: u8) {
        if !self.initialized {
            return;
        }

        // Wait for transmit FIFO to have space
        while self.read_reg(regs::FR) & flags::TXFF != 0 {
            core::hint::spin_loop();
        }
        self.write_reg(regs::DR, byte as u32);
    }

    /// Write raw bytes, expanding `\n` to `\r\n`.
    pub fn write_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Take one byte from the receive FIFO, if any.
    pub fn try_read_byte(&self) -> Option<u8> {
        if !self.initialized || self.read_reg(regs::FR) & flags::RXFE != 0 {
            return None;
        }
        Some((self.read_reg(regs::DR) & 0xFF) as u8)
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl Console for Mutex<Uart> {
    fn write_bytes(&self, bytes: &[u8]) {
        self.lock().write_bytes(bytes);
    }

    fn read_byte(&self) -> u8 {
        loop {
            // Drop the lock between polls so output is not starved.
            if let Some(byte) = self.lock().try_read_byte() {
                return byte;
            }
            core::hint::spin_loop();
        }
    }
}
