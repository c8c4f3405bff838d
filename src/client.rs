//! HTTP client for the AdGuard Home management API.
//!
//! TLS certificate validation is disabled: AdGuard Home instances are commonly
//! served with self-signed certificates on a LAN, and the exporter trusts the
//! configured host. Redirects are not followed.

use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;
use tracing::trace;

use crate::config::TargetConfig;
use crate::model::{self, LogStats, RankedEntry, ReverseDnsMap, Stats, Status};

/// The four API endpoints polled each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Status,
    Stats,
    QueryLog,
    ReverseDns,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::Stats => "stats",
            Endpoint::QueryLog => "querylog",
            Endpoint::ReverseDns => "rdns",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while fetching from AdGuard Home.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{endpoint} request to {url} failed: {source}")]
    Transport {
        endpoint: Endpoint,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} request to {url} returned status {status}")]
    Status {
        endpoint: Endpoint,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unable to read {endpoint} response body: {source}")]
    Body {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("unable to decode {endpoint} response: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

impl ScrapeError {
    /// Decode failures are tolerated; everything else aborts the cycle.
    pub fn is_decode(&self) -> bool {
        matches!(self, ScrapeError::Decode { .. })
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            ScrapeError::Client(_) => None,
            ScrapeError::Transport { endpoint, .. }
            | ScrapeError::Status { endpoint, .. }
            | ScrapeError::Body { endpoint, .. }
            | ScrapeError::Decode { endpoint, .. } => Some(*endpoint),
        }
    }

    /// Short error class used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Client(_) => "client",
            ScrapeError::Transport { .. } => "transport",
            ScrapeError::Status { .. } => "status",
            ScrapeError::Body { .. } => "body",
            ScrapeError::Decode { .. } => "decode",
        }
    }
}

/// Client bound to a single AdGuard Home instance.
pub struct AdguardClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: Option<String>,
    log_limit: u32,
}

impl AdguardClient {
    pub fn new(target: &TargetConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .timeout(target.request_timeout)
            .user_agent(concat!("adguard-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            http,
            base_url: target.base_url(),
            username: target.username.clone(),
            password: target.password.clone(),
            log_limit: target.log_limit,
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}/control/status", self.base_url)
    }

    pub fn stats_url(&self) -> String {
        format!("{}/control/stats", self.base_url)
    }

    pub fn querylog_url(&self) -> String {
        format!(
            "{}/control/querylog?limit={}&response_status=\"all\"",
            self.base_url, self.log_limit
        )
    }

    pub fn reverse_dns_url(&self, query: &str) -> String {
        format!("{}/control/clients/find?{}", self.base_url, query)
    }

    pub async fn fetch_status(&self) -> Result<Status, ScrapeError> {
        self.fetch_json(Endpoint::Status, &self.status_url()).await
    }

    pub async fn fetch_stats(&self) -> Result<Stats, ScrapeError> {
        self.fetch_json(Endpoint::Stats, &self.stats_url()).await
    }

    pub async fn fetch_query_log(&self) -> Result<LogStats, ScrapeError> {
        self.fetch_json(Endpoint::QueryLog, &self.querylog_url()).await
    }

    /// Resolves the IP sources of `top_clients` in one batched lookup.
    ///
    /// Returns an empty map without a request when no source is an IP address.
    pub async fn fetch_reverse_dns(
        &self,
        top_clients: &[RankedEntry],
    ) -> Result<ReverseDnsMap, ScrapeError> {
        let query = reverse_dns_query(top_clients);
        if query.is_empty() {
            return Ok(ReverseDnsMap::new());
        }

        let body = self
            .fetch_bytes(Endpoint::ReverseDns, &self.reverse_dns_url(&query))
            .await?;
        model::parse_reverse_dns(&body).map_err(|source| ScrapeError::Decode {
            endpoint: Endpoint::ReverseDns,
            source,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: &str,
    ) -> Result<T, ScrapeError> {
        let body = self.fetch_bytes(endpoint, url).await?;
        serde_json::from_slice(&body).map_err(|source| ScrapeError::Decode { endpoint, source })
    }

    async fn fetch_bytes(
        &self,
        endpoint: Endpoint,
        url: &str,
    ) -> Result<Vec<u8>, ScrapeError> {
        trace!("GET {}", url);

        let mut request = self.http.get(url);
        if let Some(password) = &self.password {
            request = request.basic_auth(&self.username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|source| ScrapeError::Transport {
                endpoint,
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                endpoint,
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ScrapeError::Body { endpoint, source })?;
        Ok(body.to_vec())
    }
}

/// Builds the `ip0=..&ip1=..` query for the client lookup endpoint.
///
/// Only sources that parse as IP addresses are included, in ranking order and
/// numbered without gaps.
pub fn reverse_dns_query(top_clients: &[RankedEntry]) -> String {
    Stats::ranked(top_clients)
        .map(|(_, source, _)| source)
        .filter(|source| source.parse::<IpAddr>().is_ok())
        .enumerate()
        .map(|(index, source)| format!("ip{}={}", index, source))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use std::collections::HashMap;
    use std::time::Duration;

    fn target(password: Option<&str>) -> TargetConfig {
        TargetConfig {
            protocol: Protocol::Https,
            hostname: "dns.lan".into(),
            port: 8443,
            username: "admin".into(),
            password: password.map(String::from),
            interval: Duration::from_secs(10),
            log_limit: 250,
            rdns_enabled: true,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn entry(label: &str, count: u64) -> RankedEntry {
        HashMap::from([(label.to_string(), count)])
    }

    #[test]
    fn test_endpoint_urls() {
        let client = AdguardClient::new(&target(None)).unwrap();
        assert_eq!(client.status_url(), "https://dns.lan:8443/control/status");
        assert_eq!(client.stats_url(), "https://dns.lan:8443/control/stats");
        assert_eq!(
            client.querylog_url(),
            "https://dns.lan:8443/control/querylog?limit=250&response_status=\"all\""
        );
        assert_eq!(
            client.reverse_dns_url("ip0=10.0.0.1"),
            "https://dns.lan:8443/control/clients/find?ip0=10.0.0.1"
        );
    }

    #[test]
    fn test_reverse_dns_query_numbers_ips_contiguously() {
        let clients = vec![
            entry("192.168.1.10", 900),
            entry("laptop", 400),
            entry("fd00::1", 300),
        ];
        assert_eq!(reverse_dns_query(&clients), "ip0=192.168.1.10&ip1=fd00::1");
    }

    #[test]
    fn test_reverse_dns_query_skips_leading_name() {
        let clients = vec![entry("laptop", 900), entry("192.168.1.1", 80)];
        assert_eq!(reverse_dns_query(&clients), "ip0=192.168.1.1");
    }

    #[test]
    fn test_reverse_dns_query_empty() {
        assert_eq!(reverse_dns_query(&[]), "");
        assert_eq!(reverse_dns_query(&[entry("not-an-ip", 1)]), "");
    }

    #[test]
    fn test_error_classification() {
        let decode = ScrapeError::Decode {
            endpoint: Endpoint::Stats,
            source: serde_json::from_str::<Stats>("[").unwrap_err(),
        };
        assert!(decode.is_decode());
        assert_eq!(decode.kind(), "decode");
        assert_eq!(decode.endpoint(), Some(Endpoint::Stats));
    }
}
