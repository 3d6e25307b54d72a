use anyhow::{Context, Result};
use clap::Parser;
use ecgingest_config::{RuntimeConfig, ServerConfig};
use std::path::PathBuf;

/// HTTP server ingesting ECG batches with heart-rate-variability analytics
#[derive(Parser)]
#[command(name = "ecgingest")]
#[command(version)]
#[command(about = "HTTP server ingesting ECG batches with HRV analytics", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Local fallback log for batches that could not be stored
    #[arg(short, long, value_name = "FILE")]
    fallback_path: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Seconds between scheduled device registry refreshes
    #[arg(short, long, value_name = "SECS")]
    refresh_interval: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run async server
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);

    // Step 3: Validate before anything touches storage
    config.validate().context("Invalid configuration")?;

    // Step 4: Run server with resolved config
    ecgingest::run_with_config(config).await
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(path) = &cli.fallback_path {
        config.fallback.path = path.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        server.log_level = level.clone();
    }

    if let Some(secs) = cli.refresh_interval {
        config.registry.refresh_interval_secs = secs;
    }
}
