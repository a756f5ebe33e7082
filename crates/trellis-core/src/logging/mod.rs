//! # Trellis Logging Facade
//!
//! Components never talk to the logging backend directly. They receive a
//! [`Logger`] bound to a scope (`driver/api`, `core/application`, a module's
//! type name) from the shared [`LoggerFactory`], and every record goes through
//! the `log` facade with `<application>::<scope>` as its target. Which records
//! end up where is decided once, by [`backend::init`].
pub mod backend;

use std::fmt;
use std::sync::Arc;

use log::Level;

pub use backend::{StreamConfig, StreamFormat, StreamKind};

use crate::kernel::error::Result;

/// Logger bound to a single scope
#[derive(Clone, PartialEq, Eq)]
pub struct Logger {
    target: Arc<str>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Logger").field(&self.target).finish()
    }
}

impl Logger {
    pub fn new(target: impl AsRef<str>) -> Self {
        Self {
            target: Arc::from(target.as_ref()),
        }
    }

    /// Target every record of this logger is emitted under
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Derive a logger for a nested scope
    pub fn child(&self, scope: &str) -> Logger {
        Logger::new(format!("{}::{}", self.target, scope))
    }

    pub fn enabled(&self, level: Level) -> bool {
        log::log_enabled!(target: self.target(), level)
    }

    pub fn log(&self, level: Level, message: impl fmt::Display) {
        log::log!(target: self.target(), level, "{}", message);
    }

    pub fn trace(&self, message: impl fmt::Display) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }
}

/// Produces scoped loggers for one application
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    root: Logger,
}

impl LoggerFactory {
    pub fn new(name: &str) -> Self {
        Self {
            root: Logger::new(name),
        }
    }

    /// The unscoped application logger
    pub fn root(&self) -> &Logger {
        &self.root
    }

    /// Logger bound to `scope`; an empty scope returns the root logger
    pub fn get(&self, scope: &str) -> Logger {
        if scope.is_empty() {
            self.root.clone()
        } else {
            self.root.child(scope)
        }
    }

    /// Install the backend streams described by `streams`.
    ///
    /// Returns `false` when a backend was already installed for this process,
    /// in which case the new streams are ignored.
    pub fn add_streams(&self, streams: &[StreamConfig]) -> Result<bool> {
        let installed = backend::init(streams)?;
        if !installed {
            self.root
                .debug("logging backend already installed, keeping existing streams");
        }
        Ok(installed)
    }
}
