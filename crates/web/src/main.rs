//! Superlists web server binary

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use superlists_web::WebConfig;

#[derive(Parser)]
#[command(name = "superlists-web")]
#[command(about = "Superlists - to-do lists served over HTTP")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config and SUPERLISTS_WEB_ADDR)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Database file (overrides config and SUPERLISTS_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Keep lists in memory only
    #[arg(long)]
    memory: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("Superlists web v{}", superlists_common::VERSION);

    let mut config = match &cli.config {
        Some(path) => WebConfig::load(path)?,
        None => WebConfig::default(),
    }
    .apply_env()?;

    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
        config.in_memory = false;
    }
    if cli.memory {
        config.in_memory = true;
    }

    if config.in_memory {
        info!("Using in-memory store");
    } else {
        info!("Using database {}", config.db_path.display());
    }

    superlists_web::serve(config).await?;

    info!("Shutdown complete");
    Ok(())
}
