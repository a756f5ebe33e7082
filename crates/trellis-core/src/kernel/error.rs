//! # Trellis Kernel Errors
//!
//! Defines error types specific to the Trellis kernel.
//!
//! This module includes [`Error`], the primary enum encompassing the failures
//! that can occur while bootstrapping: missing or unreadable configuration,
//! components that cannot be resolved from the catalog, and component
//! initialization failures. Every one of them is fatal to the startup
//! sequence; the orchestrator never retries.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::event::error::EventSystemError;
use crate::kernel::component::ComponentKind;

/// Custom error type for the Trellis kernel
#[derive(Debug, ThisError)]
pub enum Error {
    /// No configuration tree exists for the active environment
    #[error("No configuration found for environment '{environment}'")]
    ConfigMissing { environment: String },

    /// A configuration source could not be read or parsed
    #[error("Failed to load configuration from '{}': {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },

    /// A configuration value exists but does not match the expected shape
    #[error("Invalid configuration at '{path}': {source}")]
    ConfigInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Neither the custom nor the built-in driver table knows the requested driver
    #[error("Unknown driver for \"{component}\" [{driver}]")]
    UnknownDriver { component: String, driver: String },

    /// The module table has no constructor for the requested module
    #[error("Unknown module \"{component}\"")]
    UnknownModule { component: String },

    /// A component failed to construct or initialize
    #[error("{kind} initializing failed: {name}: {source}")]
    ComponentInit {
        kind: ComponentKind,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
    },

    /// Typed event system error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// The logging backend could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// A driver reported an unrecoverable setup or runtime failure
    #[error("Driver '{driver}' failed: {message}")]
    Driver { driver: String, message: String },

    #[error("I/O error during '{operation}': {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("RunPreCheck")]
    RunPreCheck,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Error::Io {
            source,
            operation: operation.into(),
        }
    }

    pub fn driver(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Driver {
            driver: driver.into(),
            message: message.into(),
        }
    }

    /// Name and kind of the component that caused this error, if any.
    pub fn component(&self) -> Option<(ComponentKind, &str)> {
        match self {
            Error::ComponentInit { kind, name, .. } => Some((*kind, name.as_str())),
            Error::UnknownDriver { component, .. } => Some((ComponentKind::Driver, component.as_str())),
            Error::UnknownModule { component } => Some((ComponentKind::Module, component.as_str())),
            _ => None,
        }
    }
}
