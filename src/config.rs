//! Configuration management for adguard-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! environment variables and CLI arguments. It supports YAML, JSON, and TOML formats,
//! and derives one [`TargetConfig`] per configured AdGuard Home hostname.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 9617;
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_LOG_LIMIT: u32 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("protocol {0} is invalid. Must be http or https.")]
    InvalidProtocol(String),

    #[error("adguard_port '{0}' is not a valid port number")]
    InvalidPort(String),

    #[error("at least one adguard_hostname must be configured")]
    NoHostnames,

    #[error("interval_seconds must be greater than 0")]
    ZeroInterval,

    #[error("log_limit must be greater than 0")]
    ZeroLogLimit,

    #[error("log_level '{0}' is invalid. Must be off, error, warn, info, debug or trace.")]
    InvalidLogLevel(String),

    #[error("unable to read adguard_password from {path}: {source}")]
    PasswordFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Scheme used to reach an AdGuard Home instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Port used when none is configured.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective settings for one monitored AdGuard Home instance.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub protocol: Protocol,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    /// `None` when no password is configured; requests are then sent without credentials.
    pub password: Option<String>,
    pub interval: Duration,
    pub log_limit: u32,
    pub rdns_enabled: bool,
    pub request_timeout: Duration,
}

impl TargetConfig {
    /// `http://host:port` prefix for all API requests.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.hostname, self.port)
    }
}

/// Exporter configuration as read from file, environment and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // AdGuard Home connection
    #[serde(alias = "adguard-protocol")]
    pub adguard_protocol: Option<String>,
    #[serde(alias = "adguard-hostname")]
    pub adguard_hostname: Option<Vec<String>>,
    #[serde(alias = "adguard-username")]
    pub adguard_username: Option<String>,
    #[serde(alias = "adguard-password")]
    pub adguard_password: Option<String>,
    #[serde(alias = "password-from-file")]
    pub password_from_file: Option<bool>,
    /// Empty or unset selects the protocol's default port.
    #[serde(alias = "adguard-port")]
    pub adguard_port: Option<String>,

    // Server configuration
    #[serde(alias = "server-port")]
    pub server_port: Option<u16>,
    pub bind: Option<String>,

    // Polling
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    #[serde(alias = "log-limit")]
    pub log_limit: Option<u32>,
    #[serde(alias = "rdns-enabled")]
    pub rdns_enabled: Option<bool>,
    #[serde(alias = "request-timeout-seconds")]
    pub request_timeout_seconds: Option<u64>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adguard_protocol: Some("http".into()),
            adguard_hostname: Some(vec![DEFAULT_HOSTNAME.to_string()]),
            adguard_username: Some(String::new()),
            adguard_password: Some(String::new()),
            password_from_file: Some(false),
            adguard_port: None,
            server_port: Some(DEFAULT_SERVER_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            log_limit: Some(DEFAULT_LOG_LIMIT),
            rdns_enabled: Some(true),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn protocol(&self) -> Result<Protocol, ConfigError> {
        self.adguard_protocol.as_deref().unwrap_or("http").parse()
    }

    /// Effective AdGuard Home port, defaulting by protocol when unset or empty.
    pub fn effective_port(&self) -> Result<u16, ConfigError> {
        let protocol = self.protocol()?;
        match self.adguard_port.as_deref().map(str::trim) {
            None | Some("") => Ok(protocol.default_port()),
            Some(port) => port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.to_string())),
        }
    }

    /// Effective password, read from disk when `password_from_file` is set.
    pub fn resolve_password(&self) -> Result<Option<String>, ConfigError> {
        let value = self.adguard_password.clone().unwrap_or_default();

        let password = if self.password_from_file.unwrap_or(false) {
            let secret = fs::read_to_string(&value).map_err(|source| ConfigError::PasswordFile {
                path: value.clone(),
                source,
            })?;
            secret.trim_end_matches(['\r', '\n']).to_string()
        } else {
            value
        };

        Ok(if password.is_empty() {
            None
        } else {
            Some(password)
        })
    }

    /// Configured hostnames, trimmed, without empties or repeats, in order.
    pub fn hostnames(&self) -> Vec<String> {
        let mut hostnames: Vec<String> = Vec::new();
        for host in self.adguard_hostname.as_deref().unwrap_or_default() {
            let host = host.trim();
            if !host.is_empty() && !hostnames.iter().any(|h| h == host) {
                hostnames.push(host.to_string());
            }
        }
        hostnames
    }

    /// Effective log level; unset means `info`.
    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        match self.log_level.as_deref().map(str::trim) {
            None | Some("") => Ok(LogLevel::default()),
            Some(level) => <LogLevel as ValueEnum>::from_str(level, true)
                .map_err(|_| ConfigError::InvalidLogLevel(level.to_string())),
        }
    }

    /// Builds one target per configured hostname.
    pub fn targets(&self) -> Result<Vec<TargetConfig>, ConfigError> {
        let protocol = self.protocol()?;
        let port = self.effective_port()?;

        let interval_seconds = self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS);
        if interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let log_limit = self.log_limit.unwrap_or(DEFAULT_LOG_LIMIT);
        if log_limit == 0 {
            return Err(ConfigError::ZeroLogLimit);
        }

        let hostnames = self.hostnames();
        if hostnames.is_empty() {
            return Err(ConfigError::NoHostnames);
        }

        let password = self.resolve_password()?;
        let request_timeout = Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
                .max(1),
        );

        Ok(hostnames
            .into_iter()
            .map(|hostname| TargetConfig {
                protocol,
                hostname,
                port,
                username: self.adguard_username.clone().unwrap_or_default(),
                password: password.clone(),
                interval: Duration::from_secs(interval_seconds),
                log_limit,
                rdns_enabled: self.rdns_enabled.unwrap_or(true),
                request_timeout,
            })
            .collect())
    }

    /// Copy of the configuration that is safe to print or serve.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        if cfg
            .adguard_password
            .as_deref()
            .is_some_and(|p| !p.is_empty())
            && !cfg.password_from_file.unwrap_or(false)
        {
            cfg.adguard_password = Some("********".into());
        }
        cfg
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.targets()?;
    cfg.log_level()?;

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_tls_file(cert, "certificate")?;
                check_tls_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_tls_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
/// This enforces precedence: CLI/env (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(protocol) = &args.adguard_protocol {
        config.adguard_protocol = Some(protocol.clone());
    }
    if !args.adguard_hostname.is_empty() {
        config.adguard_hostname = Some(args.adguard_hostname.clone());
    }
    if let Some(username) = &args.adguard_username {
        config.adguard_username = Some(username.clone());
    }
    if let Some(password) = &args.adguard_password {
        config.adguard_password = Some(password.clone());
    }
    if let Some(from_file) = args.password_from_file {
        config.password_from_file = Some(from_file);
    }
    if let Some(port) = &args.adguard_port {
        config.adguard_port = Some(port.clone());
    }

    if let Some(port) = args.server_port {
        config.server_port = Some(port);
    }
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    if let Some(interval) = args.interval {
        config.interval_seconds = Some(interval);
    }
    if let Some(limit) = args.log_limit {
        config.log_limit = Some(limit);
    }
    if let Some(rdns) = args.rdns_enabled {
        config.rdns_enabled = Some(rdns);
    }
    if let Some(timeout) = args.request_timeout {
        config.request_timeout_seconds = Some(timeout);
    }

    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/adguard-exporter/config.yaml",
            "/etc/adguard-exporter/config.yml",
            "/etc/adguard-exporter/config.json",
            "./adguard-exporter.yaml",
            "./adguard-exporter.yml",
            "./adguard-exporter.json",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    // Missing keys fall back to the defaults rather than to None.
    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let partial: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            partial
        }
        Some("toml") => {
            let partial: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            partial
        }
        _ => {
            let partial: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            partial
        }
    };

    Ok(merge_defaults(config))
}

fn merge_defaults(cfg: Config) -> Config {
    let d = Config::default();
    Config {
        adguard_protocol: cfg.adguard_protocol.or(d.adguard_protocol),
        adguard_hostname: cfg.adguard_hostname.or(d.adguard_hostname),
        adguard_username: cfg.adguard_username.or(d.adguard_username),
        adguard_password: cfg.adguard_password.or(d.adguard_password),
        password_from_file: cfg.password_from_file.or(d.password_from_file),
        adguard_port: cfg.adguard_port.or(d.adguard_port),
        server_port: cfg.server_port.or(d.server_port),
        bind: cfg.bind.or(d.bind),
        interval_seconds: cfg.interval_seconds.or(d.interval_seconds),
        log_limit: cfg.log_limit.or(d.log_limit),
        rdns_enabled: cfg.rdns_enabled.or(d.rdns_enabled),
        request_timeout_seconds: cfg.request_timeout_seconds.or(d.request_timeout_seconds),
        log_level: cfg.log_level.or(d.log_level),
        enable_tls: cfg.enable_tls.or(d.enable_tls),
        tls_cert_path: cfg.tls_cert_path.or(d.tls_cert_path),
        tls_key_path: cfg.tls_key_path.or(d.tls_key_path),
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.redacted();
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
    };

    println!("{output}");
    Ok(())
}

/// Logs the effective configuration at startup without revealing the password.
pub fn log_effective_config(cfg: &Config) {
    info!("---------------------------------------");
    info!("- AdGuard Home exporter configuration -");
    info!("---------------------------------------");
    info!("adguard_protocol : {}", cfg.adguard_protocol.as_deref().unwrap_or("http"));
    info!("adguard_hostname : {:?}", cfg.hostnames());
    info!(
        "adguard_port : {}",
        cfg.effective_port()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| "invalid".into())
    );
    info!("adguard_username : {}", cfg.adguard_username.as_deref().unwrap_or(""));
    if cfg.adguard_password.as_deref().is_some_and(|p| !p.is_empty()) {
        let method = if cfg.password_from_file.unwrap_or(false) {
            "basic (password file)"
        } else {
            "basic"
        };
        info!("authentication : {}", method);
    }
    info!(
        "server : {}:{}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR),
        cfg.server_port.unwrap_or(DEFAULT_SERVER_PORT)
    );
    info!(
        "interval : {}s",
        cfg.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS)
    );
    info!("log_limit : {}", cfg.log_limit.unwrap_or(DEFAULT_LOG_LIMIT));
    info!("rdns_enabled : {}", cfg.rdns_enabled.unwrap_or(true));
    info!("---------------------------------------");
}
