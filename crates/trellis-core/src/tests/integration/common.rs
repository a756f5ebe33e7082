#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::event::{Mediator, sync_handler, EventResult};
use crate::kernel::bootstrap::{Application, ApplicationOptions};
use crate::kernel::catalog::Catalog;
use crate::kernel::component::{Driver, DriverBase, Module, ModuleBase};
use crate::kernel::constants::{APPLICATION_RUN_TOPIC, keys};
use crate::kernel::container::Container;
use crate::kernel::error::{Error, Result};
use crate::logging::Logger;

pub const TEST_ENV: &str = "test";

// ===== JOURNAL =====

/// Ordered record of what the fixtures did, shared with the test body
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }
}

/// Behaviour knobs read from a fixture's `config`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub fail: bool,
    pub delay_ms: u64,
    /// Container keys that must be present when `init` runs
    pub requires: Vec<String>,
    /// Subscribe to `application:run` and record the container keys seen then
    pub announce: bool,
}

impl ProbeSettings {
    fn from_config(config: &Value) -> Self {
        serde_json::from_value(config.clone()).unwrap_or_default()
    }
}

// ===== DRIVERS =====

/// Driver recording its initialization, tagged by the constructor that built it
pub struct ProbeDriver {
    base: DriverBase,
    tag: &'static str,
    journal: Journal,
}

impl ProbeDriver {
    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

#[async_trait]
impl Driver for ProbeDriver {
    fn base(&self) -> &DriverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DriverBase {
        &mut self.base
    }

    async fn init(&mut self) -> Result<()> {
        let settings = ProbeSettings::from_config(self.config());
        if settings.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
        }
        if settings.fail {
            self.journal
                .record(format!("driver-failed:{}", self.log().target()));
            return Err(Error::driver(self.tag, "probe failure"));
        }
        self.journal
            .record(format!("driver:{}:{}", self.tag, self.log().target()));
        Ok(())
    }
}

pub fn probe_driver(
    tag: &'static str,
    journal: &Journal,
) -> impl Fn(Value, Logger) -> Result<Box<dyn Driver>> + Send + Sync + 'static {
    let journal = journal.clone();
    move |config, logger: Logger| {
        journal.record(format!("constructed:{}", logger.target()));
        let driver: Box<dyn Driver> = Box::new(ProbeDriver {
            base: DriverBase::new(config, logger),
            tag,
            journal: journal.clone(),
        });
        Ok(driver)
    }
}

// ===== MODULES =====

/// Module checking its `requires` keys and optionally watching `application:run`
pub struct ProbeModule {
    base: ModuleBase,
    name: String,
    journal: Journal,
}

#[async_trait]
impl Module for ProbeModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    async fn init(&mut self) -> Result<()> {
        let settings = ProbeSettings::from_config(self.config());
        if settings.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
        }
        for key in &settings.requires {
            if !self.container().contains(key) {
                return Err(Error::Other(format!("{} requires '{}'", self.name, key)));
            }
        }
        if settings.fail {
            self.journal.record(format!("module-failed:{}", self.name));
            return Err(Error::Other(format!("{} probe failure", self.name)));
        }
        if settings.announce {
            let mediator = self
                .container()
                .get::<Mediator>(keys::MEDIATOR)
                .ok_or_else(|| Error::Other("mediator is not registered".to_string()))?;
            let container = self.container().clone();
            let journal = self.journal.clone();
            mediator
                .on(
                    APPLICATION_RUN_TOPIC,
                    sync_handler(move |_event| {
                        journal.record(format!("announce:{}", container.keys().join(",")));
                        EventResult::Continue
                    }),
                )
                .await?;
        }
        self.journal.record(format!("module:{}", self.name));
        Ok(())
    }
}

pub fn probe_module(
    name: &str,
    journal: &Journal,
) -> impl Fn(Container, Value) -> Result<Box<dyn Module>> + Send + Sync + 'static {
    let name = name.to_string();
    let journal = journal.clone();
    move |container, config| {
        journal.record(format!("constructed:module/{}", name));
        let module: Box<dyn Module> = Box::new(ProbeModule {
            base: ModuleBase::new::<ProbeModule>(container, config),
            name: name.clone(),
            journal: journal.clone(),
        });
        Ok(module)
    }
}

// ===== APPLICATION =====

/// Application in the `test` environment with `tree` as its configuration
/// and an empty catalog
pub fn application(tree: Value) -> Application {
    Application::with_catalog(
        ApplicationOptions::new("trellis-test")
            .version("1.2.3")
            .environment(TEST_ENV)
            .config(TEST_ENV, tree),
        Catalog::new(),
    )
    .expect("Application::with_catalog failed")
}

/// Descriptor shorthand: `{ "enabled": true, "driver": <driver>, "config": <config> }`
pub fn enabled_driver(driver: &str, config: Value) -> Value {
    json!({ "enabled": true, "driver": driver, "config": config })
}

pub fn enabled_module(config: Value) -> Value {
    json!({ "enabled": true, "config": config })
}
