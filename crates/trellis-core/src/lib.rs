pub mod config;
pub mod drivers;
pub mod event;
pub mod kernel;
pub mod logging;

// Re-export the types applications are built from
pub use config::{ComponentDescriptor, Config};
pub use event::{Event, EventResult, Mediator, MediatorOptions};
pub use kernel::error::Error as KernelError;
pub use kernel::{
    Application, ApplicationOptions, Catalog, ComponentKind, Container, Driver, DriverBase, Module,
    ModuleBase,
};
pub use logging::{Logger, LoggerFactory};
