use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::kernel::constants::keys;
use crate::kernel::container::{Container, Service};
use crate::kernel::error::Result;
use crate::logging::{Logger, LoggerFactory};

/// The two startup phases, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Driver,
    Module,
}

impl ComponentKind {
    /// Prefix of the container keys components of this kind are published under
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Driver => "driver",
            ComponentKind::Module => "module",
        }
    }

    /// Container key for the component `name`, e.g. `driver/api`
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.as_str(), name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion of a boxed component into a container [`Service`].
///
/// Implemented for every sized `Send + Sync` type, so concrete drivers and
/// modules get it for free and it stays callable through `dyn Driver` /
/// `dyn Module`.
pub trait IntoService: Any + Send + Sync {
    fn into_service(self: Box<Self>) -> Service;
}

impl<T: Any + Send + Sync> IntoService for T {
    fn into_service(self: Box<Self>) -> Service {
        let shared: Arc<T> = Arc::from(self);
        shared
    }
}

/// State every driver carries: its configuration slice and its private logger
#[derive(Debug, Clone)]
pub struct DriverBase {
    config: Value,
    logger: Logger,
}

impl DriverBase {
    pub fn new(config: Value, logger: Logger) -> Self {
        Self { config, logger }
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn set_config(&mut self, config: Value) {
        self.config = config;
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Infrastructure component (listener, client pool, ...).
///
/// Drivers sit below the container: they are built from their own
/// configuration and a logger scoped to `driver/<name>`, never from the
/// container itself.
#[async_trait]
pub trait Driver: IntoService {
    fn base(&self) -> &DriverBase;

    fn base_mut(&mut self) -> &mut DriverBase;

    fn config(&self) -> &Value {
        self.base().config()
    }

    fn set_config(&mut self, config: Value) {
        self.base_mut().set_config(config);
    }

    fn log(&self) -> &Logger {
        self.base().logger()
    }

    /// Bring the driver to a fully operational state.
    ///
    /// Must only return `Ok` once the driver is usable; any error is fatal
    /// to the whole startup.
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// The value published to the container once `init` succeeded.
    ///
    /// Defaults to the driver itself; drivers wrapping a handle (a bound
    /// server, a client) publish that handle instead.
    fn instance(self: Box<Self>) -> Service {
        self.into_service()
    }
}

/// State every module carries: the shared container, its configuration and a scoped logger
#[derive(Debug, Clone)]
pub struct ModuleBase {
    container: Container,
    config: Value,
    logger: Logger,
}

impl ModuleBase {
    /// Build the base for module type `M`; its logger is derived from the
    /// container's logger factory and scoped to the short type name of `M`.
    pub fn new<M: ?Sized>(container: Container, config: Value) -> Self {
        let scope = short_type_name::<M>();
        let logger = container
            .get::<LoggerFactory>(keys::LOGGER)
            .map(|factory| factory.get(scope))
            .unwrap_or_else(|| Logger::new(scope));
        Self {
            container,
            config,
            logger,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Application component built on top of drivers.
///
/// Modules receive the whole container and may look up any driver or any
/// module of the same phase that already finished initializing.
#[async_trait]
pub trait Module: IntoService {
    fn base(&self) -> &ModuleBase;

    fn config(&self) -> &Value {
        self.base().config()
    }

    fn container(&self) -> &Container {
        self.base().container()
    }

    fn log(&self) -> &Logger {
        self.base().logger()
    }

    async fn init(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Last path segment of a type name, generics stripped: `app::modules::Status` -> `Status`
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A constructed component awaiting initialization
pub enum ComponentInstance {
    Driver(Box<dyn Driver>),
    Module(Box<dyn Module>),
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentInstance").field(&self.kind()).finish()
    }
}

impl ComponentInstance {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentInstance::Driver(_) => ComponentKind::Driver,
            ComponentInstance::Module(_) => ComponentKind::Module,
        }
    }

    pub async fn init(&mut self) -> Result<()> {
        match self {
            ComponentInstance::Driver(driver) => driver.init().await,
            ComponentInstance::Module(module) => module.init().await,
        }
    }

    /// The value to publish: the driver's chosen instance, or the module itself
    pub fn into_service(self) -> Service {
        match self {
            ComponentInstance::Driver(driver) => driver.instance(),
            ComponentInstance::Module(module) => IntoService::into_service(module),
        }
    }
}
