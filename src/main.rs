use anyhow::Result;
use clap::Parser;
use motioncam::logging::{init_logging, LogFormat, Verbosity};
use motioncam::{Controller, MotioncamConfig, ShutdownReason};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "motioncam")]
#[command(about = "Motion-triggered camera recorder with per-day clip storage")]
#[command(version)]
#[command(long_about = "Watches a camera for motion by frame differencing. When motion is \
detected it sends a notification, records a fixed-length clip into a per-day directory, \
pauses for a cooldown and resumes watching.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "motioncam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Open camera and storage, then release them and exit
    #[arg(long, help = "Open the camera and prepare storage, then exit")]
    dry_run: bool,

    /// Replace the camera with a synthetic scene
    #[arg(long, help = "Use a simulated camera with periodic motion")]
    simulate: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, help = "Log output format")]
    log_format: LogFormat,

    /// Also write daily-rotated log files here
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let verbosity = Verbosity {
        debug: args.debug,
        verbose: args.verbose,
        quiet: args.quiet,
    };
    let log_guard = init_logging(
        verbosity,
        args.log_format,
        args.log_dir.as_deref(),
        "motioncam.log",
    )?;

    info!("Starting motioncam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match MotioncamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            return Err(e.into());
        }
    }

    let mut controller = Controller::from_config(config, args.simulate).map_err(|e| {
        error!("Failed to create controller: {}", e);
        e
    })?;

    controller.start().await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    if args.dry_run {
        controller.shutdown().await;
        info!("Dry run complete");
        println!("✓ Dry run completed successfully - camera and storage are ready");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    controller.install_signal_handlers(cancel.clone());

    let summary = controller.run(cancel).await;
    let exit_code = match &summary.reason {
        ShutdownReason::Error(details) => {
            error!("Stopped after a frame source failure: {}", details);
            1
        }
        _ => 0,
    };

    info!(
        "Motioncam exited with code {} ({} clips saved)",
        exit_code, summary.clips_saved
    );

    // Flush file logging before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Motioncam configuration file");
    println!("# Every value can be overridden with MOTIONCAM_<SECTION>__<KEY>");
    println!("# Optional keys: storage.timezone (IANA name), notification.webhook_url");
    println!();
    println!("{}", toml::to_string_pretty(&MotioncamConfig::default())?);
    Ok(())
}
