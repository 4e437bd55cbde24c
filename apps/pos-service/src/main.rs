//! # Caja POS Service
//!
//! ## Usage
//! ```bash
//! # Config from ~/.config/caja-pos/service.toml (if present) + CAJA_* env
//! cargo run -p pos-service
//!
//! # Explicit config file
//! cargo run -p pos-service -- --config ./service.toml
//! ```

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use pos_service::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Caja POS Service");
                println!();
                println!("Usage: pos-service [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    TOML config file");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    pos_service::init_tracing();
    info!("Starting Caja POS service...");

    let config = ServiceConfig::load(config_path).context("loading configuration")?;
    info!(
        addr = %config.server.bind_address(),
        db = ?config.database.path,
        queue_enabled = config.queue.enabled,
        "Configuration loaded"
    );

    pos_service::serve(config, None).await
}
