//! Court booking engine, headless server
//!
//! Runs the light dispatcher and the booking expiry sweep against the
//! configured database, publishing light commands over MQTT.
//!
//! ```sh
//! # Run with default config (~/.config/court-booking/config.toml)
//! court-booking
//!
//! # Custom config path
//! court-booking --config /etc/court-booking/config.toml
//!
//! # Validate config without starting
//! court-booking --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use court_booking::config::AppConfig;
use court_booking::server::{init_tracing, EngineHandle, EngineOptions};

/// Court slot booking engine with time-triggered court lighting.
#[derive(Parser, Debug)]
#[command(
    name = "court-booking",
    version,
    about = "Court booking engine with scheduled light control",
    long_about = "Court booking engine: runs the MQTT light dispatcher and the \
                  unpaid-booking expiry sweep.\n\n\
                  Default config: ~/.config/court-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "COURT_BOOKING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(court_booking::default_config_path);

    let config = match AppConfig::load(&config_path) {
        Ok(mut cfg) => {
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            if let Some(ref level) = cli.log_level {
                info!("CLI override: log_level = {}", level);
            }
            cfg
        }
        Err(e) => {
            if cli.check {
                eprintln!("❌ Invalid configuration {}: {}", config_path.display(), e);
                return Err(e.into());
            }
            let mut cfg = AppConfig::default();
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            cfg
        }
    };

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Database    : {}", config.database.connection_url());
        println!(
            "   MQTT        : {}",
            if config.mqtt.enabled {
                format!("{}:{}", config.mqtt.host, config.mqtt.port)
            } else {
                "disabled".to_string()
            }
        );
        println!("   UTC offset  : {} min", config.booking.utc_offset_minutes);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start engine ───────────────────────────────────────────
    let handle = EngineHandle::start(EngineOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.wait().await;

    Ok(())
}
