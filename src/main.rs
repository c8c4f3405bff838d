//! adguard-exporter
//!
//! Prometheus exporter for AdGuard Home with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal, sync::watch, task::JoinSet};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};

use adguard_exporter::cli::{Args, Commands, LogLevel};
use adguard_exporter::commands::{command_check, command_config};
use adguard_exporter::config::{
    log_effective_config, resolve_config, show_config, validate_effective_config, Config,
    DEFAULT_BIND_ADDR, DEFAULT_SERVER_PORT,
};
use adguard_exporter::handlers::build_router;
use adguard_exporter::health_stats::HealthStats;
use adguard_exporter::metrics::AdguardMetrics;
use adguard_exporter::scraper::ScrapeClient;
use adguard_exporter::state::AppState;

/// Time granted to in-flight HTTP requests after a shutdown signal.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.log_level()?;
    let log_level = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves once SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Check { verbose } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config)?;
                if let Err(e) = command_check(&config, *verbose).await {
                    eprintln!("❌ {:#}", e);
                    std::process::exit(1);
                }
                Ok(())
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(&config)?;

    info!("Starting adguard-exporter {}", env!("CARGO_PKG_VERSION"));
    log_effective_config(&config);

    let targets = config.targets()?;
    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.server_port.unwrap_or(DEFAULT_SERVER_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    let health_stats = Arc::new(HealthStats::new(
        targets.iter().map(|t| t.hostname.clone()),
    ));

    // One scrape loop per target, stopped through the watch channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scrapers = JoinSet::new();
    for (target, health) in targets.into_iter().zip(health_stats.targets.iter().cloned()) {
        let client = ScrapeClient::new(target, metrics.clone(), health)?;
        scrapers.spawn(client.run(shutdown_rx.clone()));
    }
    info!("Started {} scrape loop(s)", scrapers.len());

    let state = Arc::new(AppState::new(registry, health_stats.clone(), &config));

    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = build_router(state);

    let served = if config.enable_tls.unwrap_or(false) {
        // Both paths were checked by validate_effective_config()
        let cert_path = config.tls_cert_path.as_deref().unwrap_or_default();
        let key_path = config.tls_key_path.as_deref().unwrap_or_default();

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            signal_handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
        });

        info!("adguard-exporter listening on https://{}:{}", bind_ip_str, port);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!("adguard-exporter listening on http://{}:{}", bind_ip_str, port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    // Stop the scrape loops whether the server exited cleanly or not
    let _ = shutdown_tx.send(true);
    while let Some(result) = scrapers.join_next().await {
        if let Err(e) = result {
            error!("Scrape loop terminated abnormally: {}", e);
        }
    }

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("adguard-exporter stopped gracefully");
    Ok(())
}
