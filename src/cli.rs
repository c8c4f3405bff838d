//! CLI arguments and subcommands for adguard-exporter.
//!
//! This module defines the command-line interface structure using the clap library.
//! Every setting can also be supplied through the environment variable named in
//! its help text, which keeps container deployments flag-free.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug, Default)]
#[command(
    name = "adguard-exporter",
    about = "Prometheus exporter for AdGuard Home",
    long_about = "Prometheus exporter for AdGuard Home.\n\n\
                  Polls the AdGuard Home management API of one or more instances on a fixed \
                  interval, normalizes the rotating query counters and exposes status, counters, \
                  top lists and query types on a single /metrics endpoint.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// AdGuard Home protocol (http or https)
    #[arg(long, env = "ADGUARD_PROTOCOL")]
    pub adguard_protocol: Option<String>,

    /// AdGuard Home hostname(s), repeatable or comma-separated
    #[arg(long, env = "ADGUARD_HOSTNAME", value_delimiter = ',')]
    pub adguard_hostname: Vec<String>,

    /// AdGuard Home username
    #[arg(long, env = "ADGUARD_USERNAME")]
    pub adguard_username: Option<String>,

    /// AdGuard Home password (or a path to it with --password-from-file)
    #[arg(long, env = "ADGUARD_PASSWORD", hide_env_values = true)]
    pub adguard_password: Option<String>,

    /// Treat --adguard-password as a path and read the password from that file
    #[arg(long, env = "PASSWORD_FROM_FILE", num_args = 0..=1, default_missing_value = "true")]
    pub password_from_file: Option<bool>,

    /// AdGuard Home port (empty = 80 for http, 443 for https)
    #[arg(long, env = "ADGUARD_PORT")]
    pub adguard_port: Option<String>,

    /// HTTP listen port for the metrics endpoint
    #[arg(short = 'p', long, env = "SERVER_PORT")]
    pub server_port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Poll interval, e.g. 10, 10s, 2m
    #[arg(long, env = "INTERVAL", value_parser = parse_interval_secs)]
    pub interval: Option<u64>,

    /// Number of query log entries fetched per cycle
    #[arg(long, env = "LOG_LIMIT")]
    pub log_limit: Option<u32>,

    /// Resolve top client IPs through AdGuard Home's client lookup
    #[arg(long, env = "RDNS_ENABLED", num_args = 0..=1, default_missing_value = "true")]
    pub rdns_enabled: Option<bool>,

    /// Timeout for a single request to AdGuard Home, in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Log level [default: info]
    #[arg(long, value_enum, env = "LOGLEVEL", ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Enable TLS/SSL for HTTPS on the metrics endpoint
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run one scrape cycle against every configured instance and print the result
    Check {
        /// Show top lists and query types
        #[arg(long)]
        verbose: bool,
    },
}

/// Parses an interval given as plain seconds or with an `s`, `m` or `h` suffix.
pub fn parse_interval_secs(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (digits, multiplier) = if let Some(v) = value.strip_suffix('h') {
        (v, 3600)
    } else if let Some(v) = value.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = value.strip_suffix('s') {
        (v, 1)
    } else {
        (value, 1)
    };

    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid interval '{}', expected e.g. 10, 10s, 2m", value))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("interval '{}' is too large", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_secs() {
        assert_eq!(parse_interval_secs("10"), Ok(10));
        assert_eq!(parse_interval_secs("10s"), Ok(10));
        assert_eq!(parse_interval_secs("2m"), Ok(120));
        assert_eq!(parse_interval_secs("1h"), Ok(3600));
        assert!(parse_interval_secs("ten").is_err());
        assert!(parse_interval_secs("5ms").is_err());
    }

    #[test]
    fn test_hostnames_comma_separated() {
        let args = Args::try_parse_from([
            "adguard-exporter",
            "--adguard-hostname",
            "10.0.0.1,10.0.0.2",
            "--adguard-hostname",
            "dns.lan",
        ])
        .unwrap();
        assert_eq!(args.adguard_hostname, vec!["10.0.0.1", "10.0.0.2", "dns.lan"]);
    }

    #[test]
    fn test_bool_flags_accept_bare_and_explicit_values() {
        let args = Args::try_parse_from([
            "adguard-exporter",
            "--password-from-file",
            "--rdns-enabled",
            "false",
        ])
        .unwrap();
        assert_eq!(args.password_from_file, Some(true));
        assert_eq!(args.rdns_enabled, Some(false));
    }
}
