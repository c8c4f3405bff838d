//! Per-target scrape loop.
//!
//! Each configured AdGuard Home instance gets one [`ScrapeClient`] running on
//! its own tokio task. The client owns its counter normalizer and the set of
//! label values it emitted last cycle, so targets never share mutable state.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::client::{AdguardClient, Endpoint, ScrapeError};
use crate::config::TargetConfig;
use crate::health_stats::TargetHealth;
use crate::metrics::{AdguardMetrics, EmittedSeries, Observation};
use crate::model::{ReverseDnsMap, Stats};
use crate::normalizer::CounterNormalizer;
use crate::query_types::tally_query_types;

/// Scrape state for one AdGuard Home instance.
pub struct ScrapeClient {
    target: TargetConfig,
    client: AdguardClient,
    metrics: AdguardMetrics,
    health: Arc<TargetHealth>,
    normalizer: CounterNormalizer,
    emitted: EmittedSeries,
}

impl ScrapeClient {
    pub fn new(
        target: TargetConfig,
        metrics: AdguardMetrics,
        health: Arc<TargetHealth>,
    ) -> Result<Self, ScrapeError> {
        let client = AdguardClient::new(&target)?;
        Ok(Self {
            target,
            client,
            metrics,
            health,
            normalizer: CounterNormalizer::new(),
            emitted: EmittedSeries::default(),
        })
    }

    /// Runs a single scrape cycle and publishes its result.
    ///
    /// A transport-level failure on any of the three primary endpoints skips
    /// the cycle: previously published values stay in place and `adguard_up`
    /// drops to 0.
    #[instrument(skip(self), fields(hostname = %self.target.hostname))]
    pub async fn scrape_once(&mut self) -> Result<Observation, ScrapeError> {
        let start = Instant::now();
        let hostname = self.target.hostname.clone();

        match self.collect().await {
            Ok(obs) => {
                let elapsed = start.elapsed().as_secs_f64();
                self.metrics.record(&hostname, &obs, &mut self.emitted);
                self.metrics.set_up(&hostname, true);
                self.metrics.record_scrape_duration(&hostname, elapsed);

                let now = chrono::Utc::now();
                self.metrics.record_scrape_timestamp(&hostname, now.timestamp());
                self.health.record_success(elapsed, now);

                debug!(
                    "Scrape of {} completed in {:.3}s: {}",
                    hostname,
                    elapsed,
                    obs.stats.summary()
                );
                Ok(obs)
            }
            Err(e) => {
                let endpoint = e.endpoint().map(Endpoint::as_str).unwrap_or("client");
                self.metrics.set_up(&hostname, false);
                self.metrics.record_error(&hostname, endpoint, e.kind());
                self.health.record_failure(&e.to_string());
                error!("Scrape of {} failed: {}", hostname, e);
                Err(e)
            }
        }
    }

    async fn collect(&mut self) -> Result<Observation, ScrapeError> {
        let status = self
            .tolerate_decode(self.client.fetch_status().await)?
            .unwrap_or_default();

        let stats = self.tolerate_decode(self.client.fetch_stats().await)?;
        let log = self
            .tolerate_decode(self.client.fetch_query_log().await)?
            .unwrap_or_default();

        // An undecodable stats body must not look like a counter rotation.
        let stats = match stats {
            Some(mut stats) => {
                self.normalizer.normalize_stats(&mut stats);
                stats
            }
            None => Stats::default(),
        };

        let rdns = if self.target.rdns_enabled && !stats.top_clients.is_empty() {
            self.resolve_clients(&stats).await
        } else {
            None
        };

        let top_clients = Stats::ranked(&stats.top_clients)
            .map(|(_, source, count)| (client_label(source, rdns.as_ref()), count))
            .collect();

        Ok(Observation {
            status,
            query_types: tally_query_types(&log),
            top_clients,
            stats,
        })
    }

    /// Looks up names for the top clients. Failure only disables substitution
    /// for this cycle.
    async fn resolve_clients(&self, stats: &Stats) -> Option<ReverseDnsMap> {
        match self.client.fetch_reverse_dns(&stats.top_clients).await {
            Ok(map) => {
                debug!("Resolved {} of {} top clients", map.len(), stats.top_clients.len());
                Some(map)
            }
            Err(e) => {
                warn!("Reverse DNS lookup on {} failed: {}", self.target.hostname, e);
                self.metrics
                    .record_error(&self.target.hostname, Endpoint::ReverseDns.as_str(), e.kind());
                self.health.record_rdns_failure();
                None
            }
        }
    }

    /// Turns a decode error into `None` so the cycle continues with defaults.
    fn tolerate_decode<T>(&self, result: Result<T, ScrapeError>) -> Result<Option<T>, ScrapeError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_decode() => {
                warn!("{}: {}", self.target.hostname, e);
                let endpoint = e.endpoint().map(Endpoint::as_str).unwrap_or("client");
                self.metrics
                    .record_error(&self.target.hostname, endpoint, e.kind());
                self.health.record_decode_error();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Scrapes on a fixed interval until `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting scrape loop for {} every {}s",
            self.target.base_url(),
            self.target.interval.as_secs()
        );

        let mut ticker = interval(self.target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_requested(&mut shutdown) => break,
            }
            // A cycle cancelled mid-flight publishes nothing.
            tokio::select! {
                _ = self.scrape_once() => {}
                _ = stop_requested(&mut shutdown) => break,
            }
        }

        info!("Scrape loop for {} stopped", self.target.hostname);
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Label for a top client: the resolved name when `source` is an IP address
/// with a lookup result, the source itself otherwise.
pub fn client_label(source: &str, rdns: Option<&ReverseDnsMap>) -> String {
    if source.parse::<IpAddr>().is_err() {
        return source.to_string();
    }
    rdns.and_then(|map| map.get(source))
        .cloned()
        .unwrap_or_else(|| source.to_string())
}
