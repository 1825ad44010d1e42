//! Switchyard: a microservices test dashboard.
//!
//! This is the application entry point. It loads configuration, initializes
//! tracing, builds the downstream clients and test aggregator, sets up the Axum
//! router and starts the HTTP server.

use std::path::Path;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchyard::config::{AppConfig, ServiceId, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use switchyard::http::start_server;
use switchyard::templates::init_templates;
use switchyard::{create_router, AppState};

/// Switchyard: run health and data checks against downstream services
#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "switchyard=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Configuration errors are fatal before anything else starts
    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if Path::new(&args.config).exists() {
        tracing::info!(path = %args.config, "Loaded configuration");
    } else {
        tracing::warn!(path = %args.config, "Config file not found, configured from environment");
    }

    for service in ServiceId::ALL {
        tracing::info!(
            service = %service,
            url = %config.services.base_url(service)?,
            timeout_secs = config.services.request_timeout_seconds,
            "Downstream service configured"
        );
    }
    tracing::info!(
        checks = ?config.checks.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        run_timeout_secs = ?config.run.timeout_seconds,
        "Test checks configured"
    );

    let tera = init_templates(&config.ui)?;
    tracing::info!("Initialized templates");

    let state = AppState::new(config.clone(), tera)?;
    let app = create_router(state);

    start_server(app, &config).await?;

    Ok(())
}
