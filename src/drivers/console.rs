//! Console character device interface.
//!
//! Descriptor 0 reads from it one byte at a time; descriptor 1 and the
//! process exit line write to it.

use core::fmt;

/// A byte-oriented console.
pub trait Console: Send + Sync {
    /// Write raw bytes. Never fails.
    fn write_bytes(&self, bytes: &[u8]);

    /// Block until one input byte is available and return it.
    fn read_byte(&self) -> u8;

    /// Write formatted text.
    fn print(&self, args: fmt::Arguments<'_>) {
        struct Adapter<'a, C: ?Sized>(&'a C);

        impl<C: Console + ?Sized> fmt::Write for Adapter<'_, C> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0.write_bytes(s.as_bytes());
                Ok(())
            }
        }

        let _ = fmt::write(&mut Adapter(self), args);
    }
}
