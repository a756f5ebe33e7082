#![cfg(test)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::drivers::http::HttpServer;
use crate::kernel::bootstrap::{Application, ApplicationOptions};
use crate::kernel::catalog::DriverSource;
use crate::kernel::component::{Module, ModuleBase};
use crate::kernel::container::Container;
use crate::kernel::error::{Error, Result};
use crate::tests::integration::common::{enabled_driver, enabled_module};

/// Module mounting `GET /status` on the `api` driver
struct StatusModule {
    base: ModuleBase,
}

#[async_trait]
impl Module for StatusModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    async fn init(&mut self) -> Result<()> {
        let server = self
            .container()
            .get::<HttpServer>("driver/api")
            .ok_or_else(|| Error::Other("driver/api is not an http server".to_string()))?;
        server.mount(Method::GET, "/status", |_request| async {
            (StatusCode::OK, axum::Json(json!({ "status": "up" })))
        });
        Ok(())
    }
}

fn status_module(container: Container, config: serde_json::Value) -> Result<Box<dyn Module>> {
    let module: Box<dyn Module> = Box::new(StatusModule {
        base: ModuleBase::new::<StatusModule>(container, config),
    });
    Ok(module)
}

async fn get(server: &HttpServer, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let request = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    raw
}

#[tokio::test]
async fn test_builtin_http_driver_is_resolved_by_fallback() {
    let mut app = Application::new(
        ApplicationOptions::new("trellis-test")
            .environment("test")
            .config(
                "test",
                json!({
                    "drivers": {
                        "api": enabled_driver("http", json!({ "listen": "127.0.0.1:0", "ping": true }))
                    },
                    "modules": { "status": enabled_module(json!({})) }
                }),
            ),
    )
    .unwrap();
    app.register_module("status", status_module);

    assert!(matches!(
        app.catalog().resolve_driver("http"),
        Some((DriverSource::BuiltIn, _))
    ));

    app.run().await.expect("run should succeed");

    let server: Arc<HttpServer> = app.container().get("driver/api").expect("driver/api is an HttpServer");
    assert!(get(&server, "HEAD", "/ping").await.starts_with("HTTP/1.1 204"));

    let status = get(&server, "GET", "/status").await;
    assert!(status.starts_with("HTTP/1.1 200"));
    assert!(status.contains(r#"{"status":"up"}"#));

    assert!(get(&server, "GET", "/nowhere").await.starts_with("HTTP/1.1 404"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_sibling_failure_releases_bound_listener() {
    let mut app = Application::new(
        ApplicationOptions::new("trellis-test")
            .environment("test")
            .config(
                "test",
                json!({
                    "drivers": {
                        "api": enabled_driver("http", json!({ "listen": "127.0.0.1:0" })),
                        "zz": enabled_driver("missing", json!({}))
                    }
                }),
            ),
    )
    .unwrap();

    let err = app.run().await.unwrap_err();
    assert!(matches!(err, Error::UnknownDriver { ref driver, .. } if driver == "missing"));

    // `api` settled before `zz` was resolved, so its listener is live until the application goes away
    let addr = app
        .container()
        .get::<HttpServer>("driver/api")
        .map(|server| server.local_addr())
        .expect("api was published before the failure");
    drop(app);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}
