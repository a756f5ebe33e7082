use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use trellis_core::config::Config;
use trellis_core::drivers::http::{HttpMethod, HttpServer, JsonBody};
use trellis_core::event::{EventResult, Mediator, sync_handler};
use trellis_core::kernel::component::{ComponentKind, Module, ModuleBase};
use trellis_core::kernel::constants::{APPLICATION_RUN_TOPIC, keys};
use trellis_core::kernel::container::Container;
use trellis_core::kernel::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StatusSettings {
    /// Name of the `http` driver to mount on
    server: String,
    path: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            server: "api".to_string(),
            path: "/status".to_string(),
        }
    }
}

/// Reports application identity and uptime on `GET <path>` of an `http` driver
pub struct StatusModule {
    base: ModuleBase,
    settings: StatusSettings,
}

impl StatusModule {
    pub fn create(container: Container, config: Value) -> Result<Box<dyn Module>> {
        let settings = if config.is_null() {
            StatusSettings::default()
        } else {
            serde_json::from_value(config.clone()).map_err(|source| Error::ConfigInvalid {
                path: "modules.status.config".to_string(),
                source,
            })?
        };
        let module: Box<dyn Module> = Box::new(Self {
            base: ModuleBase::new::<Self>(container, config),
            settings,
        });
        Ok(module)
    }
}

#[async_trait]
impl Module for StatusModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    async fn init(&mut self) -> Result<()> {
        let container = self.container();
        let key = ComponentKind::Driver.key(&self.settings.server);
        let server = container
            .get::<HttpServer>(&key)
            .ok_or_else(|| Error::Other(format!("status requires an http driver at '{key}'")))?;
        let mediator = container
            .get::<Mediator>(keys::MEDIATOR)
            .ok_or_else(|| Error::Other("mediator is not registered".to_string()))?;

        let name = container
            .get::<String>(keys::APPLICATION_NAME)
            .map(|name| name.as_str().to_string())
            .unwrap_or_default();
        let version = container
            .get::<String>(keys::APPLICATION_VERSION)
            .map(|version| version.as_str().to_string())
            .unwrap_or_default();
        let environment = container
            .get::<Config>(keys::CONFIG)
            .map(|config| config.environment().to_string())
            .unwrap_or_default();

        let started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());

        let since = Arc::clone(&started);
        server.mount(HttpMethod::GET, &self.settings.path, move |_request| {
            let body = json!({
                "name": name,
                "version": version,
                "environment": environment,
                "running": since.get().is_some(),
                "uptime_ms": since.get().map(|at| at.elapsed().as_millis() as u64),
            });
            async move { JsonBody(body) }
        });

        let log = self.log().clone();
        let url = format!("http://{}{}", server.local_addr(), self.settings.path);
        mediator
            .once(
                APPLICATION_RUN_TOPIC,
                sync_handler(move |_event| {
                    let _ = started.set(Instant::now());
                    log.info(format!("status available at {url}"));
                    EventResult::Continue
                }),
            )
            .await?;
        Ok(())
    }
}
