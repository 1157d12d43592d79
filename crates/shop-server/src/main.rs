//! Shop realtime server - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Realtime order and announcement fan-out for the shop.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SHOP_CONFIG", default_value = "config/default.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_format = shop_telemetry::init_logging()?;

    info!(
        log_format = %log_format,
        "Starting shop-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(config_path = %args.config, "Loading configuration");

    let config = shop_server::AppConfig::load(&args.config)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let app = shop_server::Application::new(config)?;
    app.run().await?;

    Ok(())
}
