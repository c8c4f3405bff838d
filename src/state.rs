//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. Scrape loops hold the metric handles; handlers only
//! read them back through the registry.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::health_stats::HealthStats;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub health_stats: Arc<HealthStats>,
    /// Effective configuration, already redacted.
    pub config: Config,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Registry, health_stats: Arc<HealthStats>, config: &Config) -> Self {
        Self {
            registry,
            health_stats,
            config: config.redacted(),
            start_time: Instant::now(),
        }
    }
}
