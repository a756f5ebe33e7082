//! # Trellis Kernel
//!
//! The `kernel` module forms the heart of the `trellis-core` framework. It
//! turns a per-environment configuration into a running application by
//! starting its components in a fixed order.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   initializes the core services, then every enabled driver, then every
//!   enabled module, and finally announces `application:run` on the mediator.
//! - **Components**: the [`Driver`](component::Driver) and
//!   [`Module`](component::Module) traits in the `component` submodule, and the
//!   [`Catalog`](catalog::Catalog) factory table they are resolved from.
//! - **Container**: the shared, string-keyed service registry
//!   ([`Container`](container::Container)) that every initialized component is
//!   published to.
//! - **Core Constants**: well-known container keys, config paths and topics in
//!   the `constants` submodule.
//! - **Error Handling**: kernel error types ([`Error`](error::Error)) and a
//!   `Result` alias in the `error` submodule.
pub mod bootstrap;
pub mod catalog;
pub mod component;
pub mod constants;
pub mod container;
pub mod error;

pub use bootstrap::{Application, ApplicationOptions, ApplicationState};
pub use catalog::{Catalog, DriverSource};
pub use component::{ComponentKind, Driver, DriverBase, Module, ModuleBase};
pub use container::{Container, Service};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
