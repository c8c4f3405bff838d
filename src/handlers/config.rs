//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current exporter configuration. The password is never shown.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{
    DEFAULT_BIND_ADDR, DEFAULT_INTERVAL_SECONDS, DEFAULT_LOG_LIMIT,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_SERVER_PORT,
};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.health_stats.record_http_request();

    let cfg = &state.config;
    let mut out = String::new();

    writeln!(out, "ADGUARD HOME EXPORTER - CONFIGURATION").ok();
    writeln!(out, "=====================================").ok();
    writeln!(out).ok();

    writeln!(out, "ADGUARD HOME").ok();
    writeln!(out, "------------").ok();
    writeln!(
        out,
        "protocol:                   {}",
        cfg.adguard_protocol.as_deref().unwrap_or("http")
    )
    .ok();
    writeln!(out, "hostnames:                  {}", cfg.hostnames().join(", ")).ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.effective_port()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| "invalid".to_string())
    )
    .ok();
    writeln!(
        out,
        "username:                   {}",
        cfg.adguard_username.as_deref().unwrap_or("")
    )
    .ok();
    writeln!(
        out,
        "password_from_file:         {}",
        cfg.password_from_file.unwrap_or(false)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "POLLING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "interval:                   {} seconds",
        cfg.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS)
    )
    .ok();
    writeln!(
        out,
        "log_limit:                  {}",
        cfg.log_limit.unwrap_or(DEFAULT_LOG_LIMIT)
    )
    .ok();
    writeln!(
        out,
        "rdns_enabled:               {}",
        cfg.rdns_enabled.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "request_timeout:            {} seconds",
        cfg.request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.server_port.unwrap_or(DEFAULT_SERVER_PORT)
    )
    .ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:              {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:               {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "{}", FOOTER_TEXT).ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
