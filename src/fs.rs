//! Filesystem collaborator interface.
//!
//! The syscall layer never looks inside a file; it hands opaque handles
//! back to the filesystem that produced them. Every method takes
//! `&mut self`, so a handle can only be used while holding the kernel's
//! global filesystem lock.

/// A filesystem the kernel delegates file syscalls to.
pub trait FileSystem: Send {
    /// An open file. Dropping it without `close` leaks the handle.
    type File: Send;

    /// Create a file of `initial_size` zero bytes. False if it exists or
    /// cannot be created.
    fn create(&mut self, path: &str, initial_size: u32) -> bool;

    /// Remove a file by name.
    fn remove(&mut self, path: &str) -> bool;

    /// Open a file by name.
    fn open(&mut self, path: &str) -> Option<Self::File>;

    /// Length of the file in bytes.
    fn length(&mut self, file: &Self::File) -> u32;

    /// Read from the current position, returning the bytes read.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> usize;

    /// Write at the current position, returning the bytes written.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> usize;

    /// Move the position. Seeking past the end is allowed.
    fn seek(&mut self, file: &mut Self::File, position: u32);

    /// Current position.
    fn tell(&mut self, file: &Self::File) -> u32;

    /// Release the handle.
    fn close(&mut self, file: Self::File);
}
