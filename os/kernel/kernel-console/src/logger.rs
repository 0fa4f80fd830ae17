use crate::{Console, write_to};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A [`Log`] that prints `[LEVEL] target: message` lines to a [`Console`].
pub struct ConsoleLogger<C> {
    console: C,
    max_level: LevelFilter,
}

impl<C: Console> ConsoleLogger<C> {
    #[must_use]
    pub const fn new(console: C, max_level: LevelFilter) -> Self {
        Self { console, max_level }
    }

    /// Installs this logger. Keep it in a `static`; call once during early
    /// init.
    ///
    /// # Errors
    /// If a logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError>
    where
        C: Sync + Send,
    {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn console(&self) -> &C {
        &self.console
    }
}

impl<C: Console + Sync + Send> Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        write_to(
            &self.console,
            format_args!("[{}] {}: {}\n", record.level(), record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}
