mod status;

use std::path::PathBuf;

use clap::Parser; // Use clap for argument parsing
use log::{error, info};
use trellis_core::kernel::bootstrap::{Application, ApplicationOptions};

use crate::status::StatusModule;

/// Trellis: phased driver/module application bootstrap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    ping: bool,

    /// Directory holding `<environment>.json|yaml|toml` configuration files
    #[arg(long, value_name = "DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment to run; defaults to APP_ENV, then RUST_ENV, then `development`
    #[arg(long, value_name = "ENV")]
    env: Option<String>,

    /// Start every component, then exit instead of waiting for Ctrl-C
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Handle simple ping command
    if args.ping {
        println!("pong");
        return;
    }

    let mut options = ApplicationOptions::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .root_path(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .config_dir(&args.config_dir);
    if let Some(env) = args.env {
        options = options.environment(env);
    }

    let mut app = match Application::new(options) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };
    app.register_module("status", StatusModule::create);

    // Exits the process if any component fails to start
    app.run_or_exit().await;

    if args.check {
        info!("startup check passed, shutting down");
        return;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::process::exit(1);
    }
    info!("shutting down application...");
}
