//! # Built-in Drivers
//!
//! Drivers shipped with the framework, registered into every catalog built
//! with [`Catalog::with_builtin_drivers`]. An application driver registered
//! under the same name takes precedence.
//!
//! - `http` ([`http::HttpDriver`], feature `http-server`): an axum server
//!   that modules mount routes on.
//! - `rest` ([`rest::RestDriver`], feature `http-client`): a reqwest client
//!   bound to a base URL, with retries and response emulation.
#[cfg(feature = "http-server")]
pub mod http;
#[cfg(feature = "http-client")]
pub mod rest;

use crate::kernel::catalog::Catalog;
#[cfg(any(feature = "http-server", feature = "http-client"))]
use crate::kernel::component::Driver;

/// Name of the built-in server driver
pub const HTTP_DRIVER: &str = "http";
/// Name of the built-in client driver
pub const REST_DRIVER: &str = "rest";

/// Add the built-in drivers enabled at compile time to `catalog`
#[cfg_attr(
    not(any(feature = "http-server", feature = "http-client")),
    allow(unused_variables)
)]
pub fn register_builtin(catalog: &mut Catalog) {
    #[cfg(feature = "http-server")]
    catalog.register_builtin_driver(HTTP_DRIVER, |config, logger| {
        let driver: Box<dyn Driver> = Box::new(http::HttpDriver::new(config, logger)?);
        Ok(driver)
    });

    #[cfg(feature = "http-client")]
    catalog.register_builtin_driver(REST_DRIVER, |config, logger| {
        let driver: Box<dyn Driver> = Box::new(rest::RestDriver::new(config, logger)?);
        Ok(driver)
    });
}
