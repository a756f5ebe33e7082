//! # Trellis Configuration
//!
//! [`Config`] holds one configuration tree per environment (`development`,
//! `test`, `production`, ...) and answers path lookups against the tree of
//! the active environment. The active environment comes from `APP_ENV`, then
//! `RUST_ENV`, and defaults to `development`.
//!
//! Trees are plain [`serde_json::Value`]s, assigned directly with
//! [`Config::with`] or read from `<environment>.<ext>` files with
//! [`Config::load_dir`] (JSON always, YAML and TOML behind the
//! `yaml-config` / `toml-config` features).
pub mod descriptor;
pub mod format;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use descriptor::ComponentDescriptor;
pub use format::ConfigFormat;

use crate::kernel::constants::{DEFAULT_ENVIRONMENT, ENVIRONMENT_VARS};
use crate::kernel::error::{Error, Result};
use crate::logging::Logger;

/// Name of the environment selected by the process environment
pub fn environment_from_env() -> String {
    ENVIRONMENT_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Per-environment configuration accessor
#[derive(Debug, Clone)]
pub struct Config {
    environment: String,
    configs: HashMap<String, Value>,
    logger: Logger,
}

impl Config {
    /// Create an empty configuration for the environment selected by the process environment
    pub fn new(logger: Logger) -> Self {
        Self {
            environment: environment_from_env(),
            configs: HashMap::new(),
            logger,
        }
    }

    /// Override the active environment
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Assign configuration trees by environment name, replacing existing ones
    pub fn with<K, I>(mut self, configs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (environment, tree) in configs {
            self.configs.insert(environment.into(), tree);
        }
        self
    }

    /// Load every `<environment>.<ext>` file of `dir` with a recognised format.
    ///
    /// Files are read in name order, so `test.json` is replaced by `test.toml`
    /// when both exist.
    pub fn load_dir(mut self, dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| Error::ConfigLoad {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && ConfigFormat::from_path(path).is_some())
            .collect();
        files.sort();

        for path in files {
            let Some(environment) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let environment = environment.to_string();
            let tree = Self::load_file(&path)?;
            self.logger
                .debug(format!("loaded '{}' configuration from {}", environment, path.display()));
            self.configs.insert(environment, tree);
        }
        Ok(self)
    }

    /// Parse one configuration file according to its extension
    pub fn load_file(path: &Path) -> Result<Value> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: "unknown or unsupported config format".to_string(),
        })?;
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        format.parse(&content).map_err(|message| Error::ConfigLoad {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Names of the environments with a configuration tree, sorted
    pub fn environments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Announce the active environment and make sure it has a configuration tree
    pub async fn initialize(&self) -> Result<()> {
        self.logger
            .info(format!("********** Environment: {} **********", self.environment));
        self.tree().map(|_| ())
    }

    fn tree(&self) -> Result<&Value> {
        self.configs.get(&self.environment).ok_or_else(|| {
            self.logger.error("no config, process shutdown...");
            Error::ConfigMissing {
                environment: self.environment.clone(),
            }
        })
    }

    /// Look up a dot path (`drivers.api.config`, `application.logger.0`) in
    /// the active environment. An empty path returns the whole tree, a path
    /// that does not resolve returns `Value::Null`.
    pub fn get(&self, path: &str) -> Result<Value> {
        let segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('.').collect()
        };
        self.get_path(&segments)
    }

    /// Look up a path given as individual segments
    pub fn get_path(&self, segments: &[&str]) -> Result<Value> {
        let mut current = self.tree()?;
        for segment in segments {
            let next = match current {
                Value::Object(map) => map.get(*segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }

    /// Look up `path` and deserialize it; `None` when the path is unset
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path)? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| Error::ConfigInvalid {
                    path: path.to_string(),
                    source,
                }),
        }
    }

    /// Component descriptors of one phase section; a missing section is an empty phase.
    ///
    /// An entry without a value (`api: null`, or a bare YAML key) counts as disabled.
    pub fn phase(&self, section: &str) -> Result<BTreeMap<String, ComponentDescriptor>> {
        let entries: BTreeMap<String, Option<ComponentDescriptor>> =
            self.get_as(section)?.unwrap_or_default();
        Ok(entries
            .into_iter()
            .map(|(name, descriptor)| (name, descriptor.unwrap_or_default()))
            .collect())
    }
}
