use serde::Deserialize;
use serde_json::{Map, Value};

/// Configuration record for one named driver or module
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentDescriptor {
    /// Disabled (or unset) entries are skipped without being constructed
    #[serde(default)]
    pub enabled: bool,
    /// Implementation name to resolve; only read in the drivers phase
    #[serde(default)]
    pub driver: Option<String>,
    /// Opaque configuration handed to the component
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ComponentDescriptor {
    pub fn enabled(config: Value) -> Self {
        Self {
            enabled: true,
            driver: None,
            config,
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }
}

impl Default for ComponentDescriptor {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: None,
            config: empty_object(),
        }
    }
}
