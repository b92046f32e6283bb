use anyhow::Result;
use clap::Parser;
use motioncam::dashboard::{ClipLibrary, DashboardServerBuilder};
use motioncam::logging::{init_logging, LogFormat, Verbosity};
use motioncam::MotioncamConfig;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "motioncam-dashboard")]
#[command(about = "Browse and play clips recorded by motioncam")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "motioncam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Override the clip directory from the configuration
    #[arg(long, value_name = "DIR")]
    storage_path: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    ip: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, help = "Log output format")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let verbosity = Verbosity {
        debug: args.debug,
        verbose: args.verbose,
        quiet: args.quiet,
    };
    let _log_guard = init_logging(verbosity, args.log_format, None, "motioncam-dashboard.log")?;

    let mut config = MotioncamConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(ip) = args.ip {
        config.dashboard.ip = ip;
    }
    if let Some(port) = args.port {
        config.dashboard.port = port;
    }

    let base = args
        .storage_path
        .unwrap_or_else(|| PathBuf::from(&config.storage.path));
    info!("Serving clips from {}", base.display());

    let server = DashboardServerBuilder::new()
        .config(config.dashboard)
        .library(ClipLibrary::new(base))
        .build()?;

    server.start().await.map_err(|e| {
        error!("Dashboard failed: {}", e);
        e
    })?;
    Ok(())
}
