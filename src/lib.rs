//! AdGuard Home Prometheus exporter library.
//!
//! Polls the management API of one or more AdGuard Home instances and
//! republishes their state as Prometheus metrics.
//!
//! # Usage
//!
//! ```no_run
//! use adguard_exporter::{AdguardMetrics, Config, HealthStats, ScrapeClient};
//! use prometheus::Registry;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let registry = Registry::new();
//! let metrics = AdguardMetrics::new(&registry)?;
//! let health = HealthStats::new(config.hostnames());
//!
//! for target in config.targets()? {
//!     let target_health = health.target(&target.hostname).unwrap();
//!     let mut client = ScrapeClient::new(target, metrics.clone(), target_health)?;
//!     client.scrape_once().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod handlers;
pub mod health_stats;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod query_types;
pub mod scraper;
pub mod state;

// Re-export main types for convenience
pub use client::{AdguardClient, Endpoint, ScrapeError};
pub use config::{Config, ConfigError, Protocol, TargetConfig};
pub use health_stats::{HealthStats, TargetHealth};
pub use metrics::{AdguardMetrics, Observation};
pub use normalizer::CounterNormalizer;
pub use scraper::ScrapeClient;
pub use state::{AppState, SharedState};
