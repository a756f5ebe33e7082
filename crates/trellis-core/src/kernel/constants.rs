/// Default application name when neither `APP_NAME` nor the options provide one
pub const DEFAULT_APP_NAME: &str = "application";

/// Default application version
pub const DEFAULT_APP_VERSION: &str = "0.0.0";

/// Default application root path
pub const DEFAULT_ROOT_PATH: &str = ".";

/// Environment variable overriding the application name
pub const APP_NAME_ENV: &str = "APP_NAME";

/// Environment variables selecting the active configuration environment, in lookup order
pub const ENVIRONMENT_VARS: [&str; 2] = ["APP_ENV", "RUST_ENV"];

/// Environment used when no variable selects one
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Configuration section holding the driver descriptors
pub const DRIVERS_SECTION: &str = "drivers";

/// Configuration section holding the module descriptors
pub const MODULES_SECTION: &str = "modules";

/// Configuration path of the logging stream list
pub const LOGGER_CONFIG_PATH: &str = "application.logger";

/// Configuration path of the mediator options
pub const MEDIATOR_CONFIG_PATH: &str = "application.mediator";

/// Topic emitted once every driver and module is ready
pub const APPLICATION_RUN_TOPIC: &str = "application:run";

/// Well-known container keys populated before the phased startup
pub mod keys {
    pub const APPLICATION_NAME: &str = "application/name";
    pub const APPLICATION_VERSION: &str = "application/version";
    pub const APPLICATION_ROOT_PATH: &str = "application/rootPath";
    pub const CONFIG: &str = "config";
    pub const LOGGER: &str = "logger";
    pub const MEDIATOR: &str = "mediator";

    /// All constant keys, in registration order
    pub const ALL: [&str; 6] = [
        APPLICATION_NAME,
        APPLICATION_VERSION,
        APPLICATION_ROOT_PATH,
        CONFIG,
        LOGGER,
        MEDIATOR,
    ];
}
