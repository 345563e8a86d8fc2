//! Explicit logging sink passed to every pipeline component.
//!
//! The CLI builds one [`StreamLogger`] from its verbosity flags and hands it
//! down by `&mut dyn LogSink`; nothing in the library touches a process-wide
//! logger. Messages are written one per line without level prefixes.

use log::{Level, LevelFilter};
use std::io::Write;

/// Destination for log messages emitted while vendoring.
pub trait LogSink {
    /// Record `message` at `level`.
    fn log(&mut self, level: Level, message: &str);

    /// Record an error-level message.
    fn error(&mut self, message: &str) {
        self.log(Level::Error, message);
    }

    /// Record a warning-level message.
    fn warn(&mut self, message: &str) {
        self.log(Level::Warn, message);
    }

    /// Record an info-level message.
    fn info(&mut self, message: &str) {
        self.log(Level::Info, message);
    }

    /// Record a debug-level message.
    fn debug(&mut self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Map the `--verbose` and `--quiet` flags onto a level filter.
///
/// # Examples
///
/// ```
/// use crate_vendor::logging::level_filter;
/// use log::LevelFilter;
///
/// assert_eq!(level_filter(false, false), LevelFilter::Info);
/// assert_eq!(level_filter(true, false), LevelFilter::Debug);
/// assert_eq!(level_filter(false, true), LevelFilter::Warn);
/// ```
#[must_use]
pub const fn level_filter(verbose: bool, quiet: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    }
}

/// Line-oriented sink writing to any [`Write`] implementation.
pub struct StreamLogger<W: Write> {
    writer: W,
    max_level: LevelFilter,
}

impl<W: Write> StreamLogger<W> {
    /// Create a logger that drops messages less severe than `max_level`.
    #[must_use]
    pub const fn new(writer: W, max_level: LevelFilter) -> Self {
        Self { writer, max_level }
    }

    /// Return the configured level filter.
    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Consume the logger and return the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LogSink for StreamLogger<W> {
    fn log(&mut self, level: Level, message: &str) {
        if level > self.max_level {
            return;
        }
        if writeln!(self.writer, "{message}").is_err() {
            // Best-effort logging; ignore write failures.
        }
    }
}
