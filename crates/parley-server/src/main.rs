use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

mod config;
mod server;
mod telemetry;

pub use config::ServerConfig;

/// Parley - real-time one-to-one chat server
#[derive(Debug, Parser)]
#[command(name = "parley-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (in-memory when omitted)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.database {
            config.database.path = Some(path);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let server_config = ServerConfig::load(cli.config.as_deref())
        .context("Failed to load server configuration")?;
    let server_config = cli.apply(server_config);

    telemetry::init(&server_config.log)
        .map_err(|e| anyhow::anyhow!("Failed to init telemetry: {}", e))?;

    info!("Parley Server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("License: AGPL-3.0");
    server_config.log_config();

    server::start(server_config).await?;

    telemetry::shutdown();

    Ok(())
}
