//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("adguard-exporter.yaml"),
    };

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Serializes `config`, prefixing YAML output with the option reference when `commented`.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    })
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# AdGuard Home Exporter Configuration
# ===================================
#
# AdGuard Home
# ------------
# adguard_protocol: "http"        # http or https
# adguard_hostname: ["127.0.0.1"] # One scrape loop per hostname
# adguard_username: ""            # Basic auth user
# adguard_password: ""            # Basic auth password, empty = no auth
# password_from_file: false       # Treat adguard_password as a file path
# adguard_port: null              # null or "" = 80 for http, 443 for https
#
# Polling
# -------
# interval_seconds: 10            # Seconds between scrape cycles
# log_limit: 1000                 # Query log entries fetched per cycle
# rdns_enabled: true              # Resolve top client IPs to names
# request_timeout_seconds: 10     # Per-request timeout
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                 # Bind IP (0.0.0.0 = all interfaces)
# server_port: 9617               # HTTP port for /metrics
#
# Logging
# -------
# log_level: "info"               # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false               # Serve /metrics over HTTPS
# tls_cert_path: null             # Path to TLS certificate (PEM format)
# tls_key_path: null              # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commented_yaml_parses_back() {
        let content = render_config(&Config::default(), ConfigFormat::Yaml, true).unwrap();
        assert!(content.starts_with("# AdGuard Home Exporter Configuration"));

        let parsed: Config = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed.hostnames(), vec!["127.0.0.1"]);
        assert_eq!(parsed.server_port, Some(9617));
    }

    #[test]
    fn test_json_output() {
        let content = render_config(&Config::default(), ConfigFormat::Json, false).unwrap();
        let parsed: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.interval_seconds, Some(10));
    }
}
