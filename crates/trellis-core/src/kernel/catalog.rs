use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::kernel::component::{Driver, Module};
use crate::kernel::container::Container;
use crate::kernel::error::Result;
use crate::logging::Logger;

/// Builds a driver from its configuration and scoped logger
pub type DriverConstructor = Arc<dyn Fn(Value, Logger) -> Result<Box<dyn Driver>> + Send + Sync>;

/// Builds a module from the shared container and its configuration
pub type ModuleConstructor = Arc<dyn Fn(Container, Value) -> Result<Box<dyn Module>> + Send + Sync>;

/// Where a resolved driver constructor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverSource {
    /// Registered by the application; shadows built-in drivers of the same name
    Custom,
    /// Shipped with the framework
    BuiltIn,
}

/// Factory table mapping implementation names to constructors.
///
/// Drivers resolve in two tiers: the application's custom table first, then
/// the built-in table. Modules resolve from a single table keyed by the
/// module's configuration name.
#[derive(Clone, Default)]
pub struct Catalog {
    custom_drivers: HashMap<String, DriverConstructor>,
    builtin_drivers: HashMap<String, DriverConstructor>,
    modules: HashMap<String, ModuleConstructor>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("custom_drivers", &sorted(self.custom_drivers.keys()))
            .field("builtin_drivers", &sorted(self.builtin_drivers.keys()))
            .field("modules", &sorted(self.modules.keys()))
            .finish()
    }
}

fn sorted<'a>(names: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut names: Vec<_> = names.collect();
    names.sort();
    names
}

impl Catalog {
    /// Create an empty catalog with no drivers at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the framework's built-in drivers
    pub fn with_builtin_drivers() -> Self {
        let mut catalog = Self::new();
        crate::drivers::register_builtin(&mut catalog);
        catalog
    }

    /// Register an application driver; it takes precedence over a built-in one of the same name
    pub fn register_driver<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Value, Logger) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.custom_drivers.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Register a framework-provided driver
    pub fn register_builtin_driver<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Value, Logger) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.builtin_drivers.insert(name.into(), Arc::new(constructor));
        self
    }

    pub fn register_module<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Container, Value) -> Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        self.modules.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Find the constructor for driver implementation `name`, custom table first
    pub fn resolve_driver(&self, name: &str) -> Option<(DriverSource, DriverConstructor)> {
        self.custom_drivers
            .get(name)
            .map(|ctor| (DriverSource::Custom, ctor.clone()))
            .or_else(|| {
                self.builtin_drivers
                    .get(name)
                    .map(|ctor| (DriverSource::BuiltIn, ctor.clone()))
            })
    }

    pub fn resolve_module(&self, name: &str) -> Option<ModuleConstructor> {
        self.modules.get(name).cloned()
    }

    pub fn has_driver(&self, name: &str) -> bool {
        self.resolve_driver(name).is_some()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}
