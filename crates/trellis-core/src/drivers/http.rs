//! HTTP server driver backed by axum.
//!
//! The driver binds its listener during `init` (bounded by the configured
//! timeout), serves in a background task and publishes an [`HttpServer`]
//! handle. Routes live in a shared table rather than in the axum router, so
//! modules can [`mount`](HttpServer::mount) endpoints after the listener is
//! already accepting connections.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::drivers::HTTP_DRIVER;
use crate::kernel::component::{Driver, DriverBase};
use crate::kernel::container::Service;
use crate::kernel::error::{Error, Result};
use crate::logging::Logger;

// Types appearing in the route API
pub use axum::Json as JsonBody;
pub use axum::extract::Request as HttpRequest;
pub use axum::http::{Method as HttpMethod, StatusCode as HttpStatus};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Handler of a mounted route
pub type RouteHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Listen target: a bare port (all interfaces) or a `host:port` address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Listen {
    Port(u16),
    Address(String),
}

impl Default for Listen {
    fn default() -> Self {
        Listen::Port(DEFAULT_PORT)
    }
}

impl Listen {
    /// Socket address string to bind
    pub fn address(&self) -> Result<String> {
        match self {
            Listen::Port(port) => Ok(format!("0.0.0.0:{port}")),
            Listen::Address(address) => {
                if let Ok(port) = address.parse::<u16>() {
                    Ok(format!("0.0.0.0:{port}"))
                } else if address.starts_with('/') {
                    Err(Error::driver(
                        HTTP_DRIVER,
                        format!("unix socket listeners are not supported: {address}"),
                    ))
                } else {
                    Ok(address.clone())
                }
            }
        }
    }
}

/// Health check route registered when `ping` is enabled
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PingSetup {
    pub path: String,
    pub method: String,
    pub status: u16,
    pub body: Option<Value>,
}

impl Default for PingSetup {
    fn default() -> Self {
        Self {
            path: "/ping".to_string(),
            method: "HEAD".to_string(),
            status: 204,
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub listen: Listen,
    /// Milliseconds the listener may take to bind
    pub timeout: u64,
    pub ping: bool,
    #[serde(alias = "pingSetup")]
    pub ping_setup: PingSetup,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen: Listen::default(),
            timeout: DEFAULT_TIMEOUT_MS,
            ping: false,
            ping_setup: PingSetup::default(),
        }
    }
}

impl HttpSettings {
    pub fn from_config(config: &Value) -> Result<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone())
            .map_err(|e| Error::driver(HTTP_DRIVER, format!("invalid configuration: {e}")))
    }
}

pub(super) enum Lookup {
    Found(RouteHandler),
    MethodNotAllowed(String),
    NotFound,
}

#[derive(Default)]
pub(super) struct RouteTable {
    routes: RwLock<BTreeMap<String, HashMap<Method, RouteHandler>>>,
}

pub(super) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl RouteTable {
    pub(super) fn insert(&self, method: Method, path: &str, handler: RouteHandler) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        routes
            .entry(normalize_path(path))
            .or_default()
            .insert(method, handler)
            .is_some()
    }

    pub(super) fn remove(&self, method: &Method, path: &str) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let path = normalize_path(path);
        let Some(methods) = routes.get_mut(&path) else {
            return false;
        };
        let removed = methods.remove(method).is_some();
        if methods.is_empty() {
            routes.remove(&path);
        }
        removed
    }

    pub(super) fn list(&self) -> Vec<(Method, String)> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<(Method, String)> = routes
            .iter()
            .flat_map(|(path, methods)| methods.keys().map(move |m| (m.clone(), path.clone())))
            .collect();
        list.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        list
    }

    pub(super) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        let Some(methods) = routes.get(&normalize_path(path)) else {
            return Lookup::NotFound;
        };
        if let Some(handler) = methods.get(method) {
            return Lookup::Found(handler.clone());
        }
        // HEAD falls back to GET; hyper drops the body
        if *method == Method::HEAD {
            if let Some(handler) = methods.get(&Method::GET) {
                return Lookup::Found(handler.clone());
            }
        }
        let mut allowed: Vec<&str> = methods.keys().map(Method::as_str).collect();
        allowed.sort_unstable();
        Lookup::MethodNotAllowed(allowed.join(", "))
    }
}

#[derive(Clone)]
struct DispatchState {
    routes: Arc<RouteTable>,
    logger: Logger,
}

async fn dispatch(State(state): State<DispatchState>, request: Request) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let lookup = state.routes.lookup(&method, &path);
    let response = match lookup {
        Lookup::Found(handler) => handler(request).await,
        Lookup::MethodNotAllowed(allowed) => {
            let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
            if let Ok(value) = HeaderValue::from_str(&allowed) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            response
        }
        Lookup::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    state.logger.debug(format!(
        "{} {} {} [{}ms]",
        response.status().as_u16(),
        method,
        path,
        started.elapsed().as_millis()
    ));
    response
}

pub(super) fn ping_handler(setup: &PingSetup) -> Result<(Method, RouteHandler)> {
    let method = Method::from_bytes(setup.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::driver(HTTP_DRIVER, format!("invalid ping method '{}'", setup.method)))?;
    let status = StatusCode::from_u16(setup.status)
        .map_err(|_| Error::driver(HTTP_DRIVER, format!("invalid ping status {}", setup.status)))?;
    let body = setup.body.clone();

    let handler: RouteHandler = Arc::new(move |_request: Request| {
        let response = match &body {
            None | Some(Value::Null) => status.into_response(),
            Some(Value::String(text)) => (status, text.clone()).into_response(),
            Some(value) => (status, Json(value.clone())).into_response(),
        };
        async move { response }.boxed()
    });
    Ok((method, handler))
}

/// Handle to a running server, published as `driver/<name>`
pub struct HttpServer {
    local_addr: SocketAddr,
    routes: Arc<RouteTable>,
    logger: Logger,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("local_addr", &self.local_addr)
            .field("routes", &self.routes.list())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl HttpServer {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Expose `handler` for `method` requests on `path`; replaces an existing route
    pub fn mount<F, Fut, R>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let route: RouteHandler = Arc::new(move |request: Request| {
            let response = handler(request);
            async move { response.await.into_response() }.boxed()
        });
        if self.routes.insert(method.clone(), path, route) {
            self.logger
                .warn(format!("resource replaced = {}, method = {}", path, method));
        } else {
            self.logger
                .debug(format!("resource exposed = {}, method = {}", path, method));
        }
    }

    pub fn unmount(&self, method: &Method, path: &str) -> bool {
        self.routes.remove(method, path)
    }

    /// Mounted routes as `(method, path)`, sorted by path
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes.list()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                self.logger.error(format!("server task failed: {e}"));
            }
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The `http` driver
pub struct HttpDriver {
    base: DriverBase,
    settings: HttpSettings,
    server: Option<HttpServer>,
}

impl HttpDriver {
    pub fn new(config: Value, logger: Logger) -> Result<Self> {
        let settings = HttpSettings::from_config(&config)?;
        Ok(Self {
            base: DriverBase::new(config, logger),
            settings,
            server: None,
        })
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// The running server, once `init` succeeded
    pub fn server(&self) -> Option<&HttpServer> {
        self.server.as_ref()
    }
}

#[async_trait]
impl Driver for HttpDriver {
    fn base(&self) -> &DriverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DriverBase {
        &mut self.base
    }

    async fn init(&mut self) -> Result<()> {
        let address = self.settings.listen.address()?;
        let timeout = self.settings.timeout;

        let listener = match tokio::time::timeout(
            Duration::from_millis(timeout),
            TcpListener::bind(&address),
        )
        .await
        {
            Ok(Ok(listener)) => listener,
            Ok(Err(e)) => {
                return Err(Error::driver(
                    HTTP_DRIVER,
                    format!("bind failed on {address}: {e}"),
                ));
            }
            Err(_) => {
                self.log()
                    .error(format!("instantiate timeout exceeded = {timeout}"));
                return Err(Error::driver(
                    HTTP_DRIVER,
                    format!("instantiate timeout exceeded = {timeout}"),
                ));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::io(e, "resolve http listener address"))?;

        let routes = Arc::new(RouteTable::default());
        if self.settings.ping {
            let (method, handler) = ping_handler(&self.settings.ping_setup)?;
            routes.insert(method.clone(), &self.settings.ping_setup.path, handler);
            self.log().debug(format!(
                "resource exposed = {}, method = {}",
                self.settings.ping_setup.path, method
            ));
        }

        let router = Router::new().fallback(dispatch).with_state(DispatchState {
            routes: routes.clone(),
            logger: self.log().clone(),
        });

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let logger = self.log().clone();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            match served {
                Ok(()) => logger.debug("server shut down"),
                Err(e) => logger.error(format!("server error: {e}")),
            }
        });

        self.log()
            .debug(format!("instantiated successfully [listen = {local_addr}]"));

        self.server = Some(HttpServer {
            local_addr,
            routes,
            logger: self.log().clone(),
            shutdown,
            task: Mutex::new(Some(task)),
        });
        Ok(())
    }

    fn instance(self: Box<Self>) -> Service {
        let driver = *self;
        match driver.server {
            Some(server) => Arc::new(server),
            None => Arc::new(driver.settings),
        }
    }
}
