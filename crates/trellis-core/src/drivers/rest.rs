//! REST client driver backed by reqwest.
//!
//! Publishes a [`RestClient`] bound to the configured base URL. Requests are
//! JSON in, JSON out; transport failures and transient statuses are retried
//! up to `retries` times. With `mock.emulate` set no request leaves the
//! process and the configured `mock.response` is returned instead.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::drivers::REST_DRIVER;
use crate::kernel::component::{Driver, DriverBase};
use crate::kernel::container::Service;
use crate::kernel::error::{Error, Result};
use crate::logging::Logger;

pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_RETRIES: u32 = 3;

const RETRY_BASE_DELAY_MS: u64 = 100;
const RETRY_STATUSES: [StatusCode; 7] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::PAYLOAD_TOO_LARGE,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Request emulation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    pub emulate: bool,
    /// Suppress the emulation debug output
    pub silent: bool,
    /// Returned for every emulated request; `{"ok": true}` when unset
    pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestSettings {
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout: u64,
    pub headers: BTreeMap<String, String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub retries: u32,
    /// Suppress per-request debug output
    pub silent: bool,
    #[serde(alias = "forceInsecureSSL")]
    pub force_insecure_ssl: bool,
    pub mock: MockSettings,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_TIMEOUT_MS,
            headers: BTreeMap::new(),
            username: None,
            password: None,
            retries: DEFAULT_RETRIES,
            silent: false,
            force_insecure_ssl: false,
            mock: MockSettings::default(),
        }
    }
}

impl RestSettings {
    pub fn from_config(config: &Value) -> Result<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone())
            .map_err(|e| Error::driver(REST_DRIVER, format!("invalid configuration: {e}")))
    }

    pub(super) fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::driver(REST_DRIVER, format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::driver(REST_DRIVER, format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Join `base` and `path` with exactly one slash; absolute URLs pass through
pub(super) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(super) fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(1 << attempt.min(6)))
}

/// Timeouts and refused connections may succeed on a later attempt; a request
/// that failed to build or was rejected mid-flight will not
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Client handle, published as `driver/<name>`
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Option<Client>,
    settings: Arc<RestSettings>,
    logger: Logger,
}

impl RestClient {
    fn new(settings: RestSettings, logger: Logger) -> Result<Self> {
        let client = if settings.mock.emulate {
            None
        } else {
            let client = Client::builder()
                .timeout(Duration::from_millis(settings.timeout))
                .default_headers(settings.header_map()?)
                .danger_accept_invalid_certs(settings.force_insecure_ssl)
                .build()
                .map_err(|e| Error::driver(REST_DRIVER, format!("failed to build HTTP client: {e}")))?;
            Some(client)
        };
        Ok(Self {
            client,
            settings: Arc::new(settings),
            logger,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    pub fn is_emulated(&self) -> bool {
        self.client.is_none()
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(payload)).await
    }

    /// Send `payload` as JSON to `path` (relative to the base URL) and decode
    /// the response body: JSON when it parses, a string otherwise, `null`
    /// when empty.
    pub async fn request(&self, method: Method, path: &str, payload: Option<&Value>) -> Result<Value> {
        let url = join_url(&self.settings.base_url, path);
        let Some(client) = &self.client else {
            return Ok(self.emulate(&method, &url, payload));
        };

        let mut attempt = 0;
        loop {
            let mut builder = client.request(method.clone(), &url);
            if let Some(username) = &self.settings.username {
                builder = builder.basic_auth(username, self.settings.password.as_ref());
            }
            if let Some(payload) = payload {
                builder = builder.json(payload);
            }

            let retryable = match builder.send().await {
                Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                    format!("status {}", response.status())
                }
                Ok(response) => return self.decode(&method, &url, response).await,
                Err(e) if is_transient(&e) => e.to_string(),
                Err(e) => {
                    return Err(Error::driver(
                        REST_DRIVER,
                        format!("{method} {url} failed: {e}"),
                    ));
                }
            };

            if attempt >= self.settings.retries {
                return Err(Error::driver(
                    REST_DRIVER,
                    format!("{method} {url} failed after {} attempt(s): {retryable}", attempt + 1),
                ));
            }
            let delay = retry_delay(attempt);
            self.logger.warn(format!(
                "{method} {url} failed ({retryable}), retrying in {}ms",
                delay.as_millis()
            ));
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn decode(&self, method: &Method, url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::driver(REST_DRIVER, format!("{method} {url}: failed to read body: {e}")))?;

        if !self.settings.silent {
            self.logger
                .debug(format!("{} {} {}", status.as_u16(), method, url));
        }
        if !status.is_success() {
            return Err(Error::driver(
                REST_DRIVER,
                format!("{method} {url} responded {status}: {body}"),
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn emulate(&self, method: &Method, url: &str, payload: Option<&Value>) -> Value {
        let response = self
            .settings
            .mock
            .response
            .clone()
            .unwrap_or_else(|| json!({ "ok": true }));
        if !(self.settings.silent || self.settings.mock.silent) {
            self.logger
                .debug(format!("emulation - request: {method} {url}"));
            if let Some(payload) = payload {
                self.logger
                    .debug(format!("emulation - request data: {payload}"));
            }
            self.logger
                .debug(format!("emulation - response: {response}"));
        }
        response
    }
}

/// The `rest` driver
pub struct RestDriver {
    base: DriverBase,
    settings: RestSettings,
    client: Option<RestClient>,
}

impl RestDriver {
    pub fn new(config: Value, logger: Logger) -> Result<Self> {
        let settings = RestSettings::from_config(&config)?;
        Ok(Self {
            base: DriverBase::new(config, logger),
            settings,
            client: None,
        })
    }

    pub fn settings(&self) -> &RestSettings {
        &self.settings
    }
}

#[async_trait]
impl Driver for RestDriver {
    fn base(&self) -> &DriverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DriverBase {
        &mut self.base
    }

    async fn init(&mut self) -> Result<()> {
        if self.settings.base_url.is_empty() && !self.settings.mock.emulate {
            self.log().warn("no base_url configured, request paths must be absolute URLs");
        }
        let client = RestClient::new(self.settings.clone(), self.log().clone())?;
        if client.is_emulated() {
            self.log().debug("instantiated in emulation mode");
        } else {
            self.log()
                .debug(format!("instantiated successfully [base_url = {}]", client.base_url()));
        }
        self.client = Some(client);
        Ok(())
    }

    fn instance(self: Box<Self>) -> Service {
        let driver = *self;
        match driver.client {
            Some(client) => Arc::new(client),
            None => Arc::new(driver.settings),
        }
    }
}
