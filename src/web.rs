#![cfg(not(tarpaulin_include))]

use lab_processes::app;
use lab_processes::config::AppConfig;
use std::env;

/// Main entry point for the web application
///
/// Settings come from the environment (see [`AppConfig::from_env`]); the
/// first two command line arguments override the bind address and the
/// worksheet file.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env()?.with_args(&args);

    log::info!(
        "Starting web server on {} with worksheet {}",
        config.bind_addr,
        config.store_path.display()
    );
    app::run(config).await
}
