#![deny(missing_docs)]
//! Shared logging utilities for the starcard workspace.
//!
//! Components do not log through an ambient global. Each one receives a
//! [`RunLogger`] when it is constructed, and the `engine_*` macros below take
//! that handle as their first argument so every line carries the run id and
//! the component scope it came from. The handle still forwards to the `log`
//! facade, so whichever backend the binary installs receives the output.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use log::Level;

/// Log target used for every line emitted through a [`RunLogger`].
pub const TARGET: &str = "starcard";

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable, run-scoped logging capability.
///
/// Cloning is cheap; a component that spawns tasks clones its logger into
/// them. [`RunLogger::scoped`] derives a child handle with the same run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogger {
    run_id: u64,
    scope: Cow<'static, str>,
}

impl RunLogger {
    /// Creates a logger for an explicit run id.
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            scope: Cow::Borrowed("run"),
        }
    }

    /// Creates a logger for a new run with a process-unique id.
    pub fn for_new_run() -> Self {
        Self::new(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns a handle for the same run, tagged with another component scope.
    pub fn scoped(&self, scope: impl Into<Cow<'static, str>>) -> Self {
        Self {
            run_id: self.run_id,
            scope: scope.into(),
        }
    }

    /// The id of the run this logger belongs to.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// The component scope attached to every line.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Emits a preformatted line. Prefer the `engine_*` macros.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        log::log!(target: TARGET, level, "[run {} {}] {}", self.run_id, self.scope, args);
    }
}

/// Logs a trace-level message through a [`RunLogger`].
#[macro_export]
macro_rules! engine_trace {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.log($crate::Level::Trace, format_args!($($arg)*));
    }};
}

/// Logs a debug-level message through a [`RunLogger`].
#[macro_export]
macro_rules! engine_debug {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.log($crate::Level::Debug, format_args!($($arg)*));
    }};
}

/// Logs an info-level message through a [`RunLogger`].
#[macro_export]
macro_rules! engine_info {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.log($crate::Level::Info, format_args!($($arg)*));
    }};
}

/// Logs a warn-level message through a [`RunLogger`].
#[macro_export]
macro_rules! engine_warn {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.log($crate::Level::Warn, format_args!($($arg)*));
    }};
}

/// Logs an error-level message through a [`RunLogger`].
#[macro_export]
macro_rules! engine_error {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.log($crate::Level::Error, format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
