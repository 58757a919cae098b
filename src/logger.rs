//! Console-backed `log` sink.
//!
//! Kernel diagnostics go through the `log` facade; this logger prints
//! them on the console as `[LEVEL] message` lines. Register it once at
//! boot with [`init`].

use core::fmt;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::drivers::Console;

/// A `log::Log` implementation writing to a console device.
pub struct ConsoleLogger<C: Console> {
    console: C,
    level: LevelFilter,
}

impl<C: Console> ConsoleLogger<C> {
    /// Create a logger printing records up to `level`.
    pub const fn new(console: C, level: LevelFilter) -> Self {
        Self { console, level }
    }

    /// The console records are printed on.
    pub fn console(&self) -> &C {
        &self.console
    }
}

impl<C: Console> Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.console
                .print(format_args!("[{}] {}\n", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

impl<C: Console> fmt::Debug for ConsoleLogger<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleLogger")
            .field("level", &self.level)
            .finish()
    }
}

/// Install `logger` as the global logger.
///
/// Fails if a logger was already installed.
pub fn init<C: Console>(logger: &'static ConsoleLogger<C>) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConsole;
    use log::Level;

    #[test]
    fn test_formats_and_filters() {
        let logger = ConsoleLogger::new(RecordingConsole::default(), LevelFilter::Info);

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("[SYSCALL] pid {} killed", 3))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("dropped"))
                .build(),
        );

        assert_eq!(logger.console().output(), "[WARN] [SYSCALL] pid 3 killed\n");
    }
}
