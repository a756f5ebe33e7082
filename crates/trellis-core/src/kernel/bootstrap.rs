use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;

use crate::config::{ComponentDescriptor, Config};
use crate::event::{Mediator, MediatorOptions};
use crate::kernel::catalog::{Catalog, DriverSource};
use crate::kernel::component::{ComponentInstance, ComponentKind, Driver, Module};
use crate::kernel::constants::{self, keys};
use crate::kernel::container::{Container, Service};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::logging::{backend, Logger, LoggerFactory, StreamConfig};

/// Lifecycle of an [`Application`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    Constructed,
    InitializingCore,
    StartingDrivers,
    StartingModules,
    /// Every component is ready and `application:run` was published
    Running,
    Failed,
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApplicationState::Constructed => "constructed",
            ApplicationState::InitializingCore => "initializing core",
            ApplicationState::StartingDrivers => "starting drivers",
            ApplicationState::StartingModules => "starting modules",
            ApplicationState::Running => "running",
            ApplicationState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Options the application is bootstrapped with
#[derive(Debug, Default)]
pub struct ApplicationOptions {
    /// Application name; `APP_NAME` takes precedence when set
    pub name: Option<String>,
    pub version: Option<String>,
    pub root_path: Option<PathBuf>,
    /// Active environment; selected from the process environment when unset
    pub environment: Option<String>,
    /// Configuration trees keyed by environment name
    pub configs: HashMap<String, Value>,
    /// Directory of `<environment>.<ext>` configuration files, loaded after `configs`
    pub config_dir: Option<PathBuf>,
    /// Extra services preloaded into the container
    pub dependencies: Vec<(String, Service)>,
}

impl ApplicationOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn root_path(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn config(mut self, environment: impl Into<String>, tree: Value) -> Self {
        self.configs.insert(environment.into(), tree);
        self
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn dependency<V>(mut self, key: impl Into<String>, value: V) -> Self
    where
        V: std::any::Any + Send + Sync,
    {
        self.dependencies.push((key.into(), Arc::new(value)));
        self
    }
}

/// Orchestrates the phased startup: core services, then every enabled
/// driver, then every enabled module, then the `application:run` announcement.
pub struct Application {
    name: String,
    version: String,
    root_path: PathBuf,
    loggers: Arc<LoggerFactory>,
    log: Logger,
    config: Arc<Config>,
    container: Container,
    catalog: Catalog,
    mediator: Option<Arc<Mediator>>,
    state: ApplicationState,
    failed_during: Option<ApplicationState>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Creates a new application with the built-in drivers available.
    pub fn new(options: ApplicationOptions) -> Result<Self> {
        Self::with_catalog(options, Catalog::with_builtin_drivers())
    }

    /// Creates a new application resolving components from `catalog` only.
    pub fn with_catalog(options: ApplicationOptions, catalog: Catalog) -> Result<Self> {
        let name = std::env::var(constants::APP_NAME_ENV)
            .ok()
            .filter(|name| !name.is_empty())
            .or(options.name)
            .unwrap_or_else(|| constants::DEFAULT_APP_NAME.to_string());
        let version = options
            .version
            .unwrap_or_else(|| constants::DEFAULT_APP_VERSION.to_string());
        let root_path = options
            .root_path
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_ROOT_PATH));

        let loggers = Arc::new(LoggerFactory::new(&name));
        let log = loggers.get("core/application");

        let mut config = Config::new(loggers.get("core/config")).with(options.configs);
        if let Some(environment) = options.environment {
            config = config.with_environment(environment);
        }
        if let Some(dir) = &options.config_dir {
            config = config.load_dir(dir)?;
        }

        let container = Container::with(options.dependencies);
        container.set(keys::APPLICATION_NAME, name.clone());
        container.set(keys::APPLICATION_VERSION, version.clone());
        container.set(keys::APPLICATION_ROOT_PATH, root_path.clone());

        Ok(Self {
            name,
            version,
            root_path,
            loggers,
            log,
            config: Arc::new(config),
            container,
            catalog,
            mediator: None,
            state: ApplicationState::Constructed,
            failed_during: None,
        })
    }

    /// Register an application driver; shadows a built-in driver of the same name
    pub fn register_driver<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Value, Logger) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.catalog.register_driver(name, constructor);
        self
    }

    pub fn register_module<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Container, Value) -> Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        self.catalog.register_module(name, constructor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn root_path(&self) -> &PathBuf {
        &self.root_path
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The event bus, available once core initialization ran
    pub fn mediator(&self) -> Option<&Arc<Mediator>> {
        self.mediator.as_ref()
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    /// State the application was in when startup failed
    pub fn failed_during(&self) -> Option<ApplicationState> {
        self.failed_during
    }

    pub fn is_running(&self) -> bool {
        self.state == ApplicationState::Running
    }

    /// Run the whole startup sequence. Any error aborts it and leaves the
    /// application in [`ApplicationState::Failed`]; an application runs at most once.
    pub async fn run(&mut self) -> Result<()> {
        if self.state != ApplicationState::Constructed {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::RunPreCheck,
                message: format!("Application cannot run from state '{}'", self.state),
            });
        }

        match self.run_phases().await {
            Ok(()) => {
                self.state = ApplicationState::Running;
                Ok(())
            }
            Err(e) => {
                self.failed_during = Some(self.state);
                self.state = ApplicationState::Failed;
                Err(e)
            }
        }
    }

    /// Run the startup sequence and terminate the process if it fails.
    pub async fn run_or_exit(&mut self) {
        if let Err(e) = self.run().await {
            self.failed(&e);
        }
    }

    async fn run_phases(&mut self) -> Result<()> {
        self.state = ApplicationState::InitializingCore;
        self.initialize().await?;

        self.state = ApplicationState::StartingDrivers;
        self.start_drivers().await?;

        self.state = ApplicationState::StartingModules;
        self.start_modules().await?;

        self.succeed().await
    }

    /// Install logging streams, create the mediator and publish the core services
    async fn initialize(&mut self) -> Result<()> {
        // Without an environment tree the default stream still has to carry
        // the diagnostics of the failing `initialize` below.
        let streams: Vec<StreamConfig> = match self.config.get_as(constants::LOGGER_CONFIG_PATH) {
            Ok(streams) => streams.unwrap_or_default(),
            Err(Error::ConfigMissing { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        self.loggers.add_streams(&streams)?;

        self.config.initialize().await?;
        self.log.info("========== Application launch ==========");

        let options: MediatorOptions = self
            .config
            .get_as(constants::MEDIATOR_CONFIG_PATH)?
            .unwrap_or_default();
        let mediator = Arc::new(Mediator::new(options, self.loggers.get("core/mediator"))?);
        self.mediator = Some(mediator.clone());

        self.container.set_shared(keys::CONFIG, self.config.clone());
        self.container.set_shared(keys::LOGGER, self.loggers.clone());
        self.container.set_shared(keys::MEDIATOR, mediator);
        Ok(())
    }

    async fn start_drivers(&self) -> Result<()> {
        let descriptors = self.config.phase(constants::DRIVERS_SECTION)?;
        self.run_component(ComponentKind::Driver, descriptors).await
    }

    async fn start_modules(&self) -> Result<()> {
        let descriptors = self.config.phase(constants::MODULES_SECTION)?;
        self.run_component(ComponentKind::Module, descriptors).await
    }

    async fn succeed(&self) -> Result<()> {
        self.log.info("application run!");
        if let Some(mediator) = &self.mediator {
            mediator.emit(constants::APPLICATION_RUN_TOPIC, None).await?;
        }
        Ok(())
    }

    /// Log the startup failure and exit the process with a non-zero status
    fn failed(&self, error: &Error) -> ! {
        // Make sure the diagnostic reaches stdout even if startup failed before
        // the configured streams were installed.
        let _ = backend::init(&[]);

        let phase = self.failed_during.unwrap_or(self.state);
        let origin = error
            .component()
            .map(|(kind, name)| format!(" ({} '{}')", kind, name))
            .unwrap_or_default();
        self.log.error(format!(
            "process shut down because of failed initialization while {}{}: {}",
            phase, origin, error
        ));
        std::process::exit(1);
    }

    /// Start every enabled component of one phase.
    ///
    /// All instantiations are launched together and awaited as a barrier.
    /// The first failure is returned and the still pending siblings are
    /// dropped, so they never reach the container.
    pub async fn run_component(
        &self,
        kind: ComponentKind,
        descriptors: BTreeMap<String, ComponentDescriptor>,
    ) -> Result<()> {
        self.log
            .info(format!("=== components with type \"{}\" are starting... ===", kind));

        let launches: Vec<_> = descriptors
            .into_iter()
            .filter(|(_, descriptor)| descriptor.enabled)
            .map(|(name, descriptor)| self.instantiate_component(kind, name, descriptor))
            .collect();

        if launches.is_empty() {
            self.log.warn(format!("no components with type \"{}\"!", kind));
        }

        try_join_all(launches).await?;

        self.log
            .info(format!("=== components with type \"{}\" are ready! ===", kind));
        Ok(())
    }

    /// Resolve, construct and initialize the component `name`
    pub async fn instantiate_component(
        &self,
        kind: ComponentKind,
        name: String,
        descriptor: ComponentDescriptor,
    ) -> Result<()> {
        let constructed = match kind {
            ComponentKind::Module => {
                let constructor = self
                    .catalog
                    .resolve_module(&name)
                    .ok_or_else(|| Error::UnknownModule {
                        component: name.clone(),
                    })?;
                constructor(self.container.clone(), descriptor.config).map(ComponentInstance::Module)
            }
            ComponentKind::Driver => {
                let driver = descriptor.driver.as_deref().unwrap_or_default();
                let (source, constructor) =
                    self.catalog
                        .resolve_driver(driver)
                        .ok_or_else(|| Error::UnknownDriver {
                            component: name.clone(),
                            driver: driver.to_string(),
                        })?;
                if source == DriverSource::Custom {
                    self.log
                        .debug(format!("driver \"{}\" uses custom implementation [{}]", name, driver));
                }
                let logger = self.loggers.get(&kind.key(&name));
                constructor(descriptor.config, logger).map(ComponentInstance::Driver)
            }
        };

        let instance = constructed.map_err(|e| {
            self.log
                .warn(format!("{} construction failed: {}: {}", kind, name, e));
            Error::ComponentInit {
                kind,
                name: name.clone(),
                source: Box::new(e),
            }
        })?;

        self.initialize_component(&name, instance).await
    }

    /// Initialize `instance` and, only on success, publish it as `<kind>/<name>`
    pub async fn initialize_component(&self, name: &str, mut instance: ComponentInstance) -> Result<()> {
        let kind = instance.kind();
        match instance.init().await {
            Ok(()) => {
                self.container.set_shared(kind.key(name), instance.into_service());
                self.log.info(format!("{} initialized: {}", kind, name));
                Ok(())
            }
            Err(e) => {
                self.log
                    .warn(format!("{} initializing failed: {}: {}", kind, name, e));
                Err(Error::ComponentInit {
                    kind,
                    name: name.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}
