//! Logging backend initialisation via tracing-subscriber.
//!
//! `log` records emitted through [`Logger`](super::Logger) are bridged into
//! tracing and fanned out to one fmt layer per configured stream. A process
//! gets exactly one backend; later calls to [`init`] are no-ops.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use crate::kernel::error::{Error, Result};

const DEFAULT_STREAM_NAME: &str = "default";
const DEFAULT_LEVEL: &str = "debug";

/// Where a stream writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Stdout,
    File,
    /// Accepted for compatibility; written as an append-only file
    Rotate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamTarget {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One entry of the `application.logger` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_name")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: StreamKind,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: StreamFormat,
    #[serde(default)]
    pub config: StreamTarget,
}

fn default_stream_name() -> String {
    DEFAULT_STREAM_NAME.to_string()
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: default_stream_name(),
            kind: StreamKind::Stdout,
            level: default_level(),
            format: StreamFormat::Plain,
            config: StreamTarget::default(),
        }
    }
}

impl StreamConfig {
    /// Parse the stream level into a [`LevelFilter`]
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            Error::Logging(format!(
                "unrecognised log level '{}' for stream '{}'",
                self.level, self.name
            ))
        })
    }

    fn writer(&self) -> Result<BoxMakeWriter> {
        match self.kind {
            StreamKind::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
            StreamKind::File | StreamKind::Rotate => {
                let path = self.config.path.as_ref().ok_or_else(|| {
                    Error::Logging(format!("stream '{}' has no file path", self.name))
                })?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        Error::Logging(format!(
                            "failed to open log file '{}': {e}",
                            path.display()
                        ))
                    })?;
                Ok(BoxMakeWriter::new(Arc::new(file)))
            }
        }
    }

    fn layer(&self) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
        let filter = self.level_filter()?;
        let writer = self.writer()?;
        let ansi = self.kind == StreamKind::Stdout && std::io::stdout().is_terminal();
        let layer = match self.format {
            StreamFormat::Plain => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_filter(filter)
                .boxed(),
            StreamFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
        };
        Ok(layer)
    }
}

/// Install the global subscriber for `streams` (stdout when empty).
///
/// Returns `Ok(false)` if another subscriber is already installed.
pub fn init(streams: &[StreamConfig]) -> Result<bool> {
    let defaults = [StreamConfig::default()];
    let streams = if streams.is_empty() { &defaults[..] } else { streams };

    let layers = streams
        .iter()
        .map(StreamConfig::layer)
        .collect::<Result<Vec<_>>>()?;

    match tracing_subscriber::registry().with(layers).try_init() {
        Ok(()) => {
            let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
            tracing::debug!(streams = ?names, "logging backend installed");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
