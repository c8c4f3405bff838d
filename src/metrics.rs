//! Prometheus metrics definitions for adguard-exporter.
//!
//! All series carry a `hostname` label so that several AdGuard Home instances
//! can share one registry and one exposition. Each target writes only series
//! labeled with its own hostname.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use prometheus::{CounterVec, GaugeVec, Opts, Registry};

use crate::model::{Stats, Status};

/// Collection of Prometheus metrics exported for every target.
#[derive(Clone)]
pub struct AdguardMetrics {
    // ========== Status ==========
    pub running: GaugeVec,            // labels: hostname
    pub protection_enabled: GaugeVec, // labels: hostname

    // ========== Stats ==========
    pub avg_processing_time: GaugeVec,     // labels: hostname
    pub dns_queries: GaugeVec,             // labels: hostname
    pub blocked_filtering: GaugeVec,       // labels: hostname
    pub replaced_parental: GaugeVec,       // labels: hostname
    pub replaced_safebrowsing: GaugeVec,   // labels: hostname
    pub replaced_safesearch: GaugeVec,     // labels: hostname
    pub top_queried_domains: GaugeVec,     // labels: hostname, domain
    pub top_blocked_domains: GaugeVec,     // labels: hostname, domain
    pub top_clients: GaugeVec,             // labels: hostname, client

    // ========== Query log ==========
    pub query_types: GaugeVec, // labels: hostname, type

    // ========== Exporter ==========
    pub up: GaugeVec,                     // labels: hostname
    pub scrape_duration_seconds: GaugeVec, // labels: hostname
    pub last_scrape_timestamp_seconds: GaugeVec, // labels: hostname
    pub errors_total: CounterVec,         // labels: hostname, endpoint, kind
}

/// Label values a target emitted for its label-dimensioned families in the
/// previous cycle. Owned by the target's scrape loop.
#[derive(Debug, Default)]
pub struct EmittedSeries {
    pub top_queried_domains: HashSet<String>,
    pub top_blocked_domains: HashSet<String>,
    pub top_clients: HashSet<String>,
    pub query_types: HashSet<String>,
}

/// Everything one successful cycle publishes for a target.
#[derive(Debug, Default)]
pub struct Observation {
    pub status: Status,
    /// Counters are expected to be normalized already.
    pub stats: Stats,
    /// Top clients after reverse-DNS substitution, in rank order.
    pub top_clients: Vec<(String, u64)>,
    pub query_types: HashMap<String, u64>,
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help), labels)
}

impl AdguardMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let running = gauge_vec(
            "adguard_running",
            "Whether AdGuard Home is running (1) or not (0)",
            &["hostname"],
        )?;
        let protection_enabled = gauge_vec(
            "adguard_protection_enabled",
            "Whether DNS filtering protection is enabled (1) or not (0)",
            &["hostname"],
        )?;

        let avg_processing_time = gauge_vec(
            "adguard_avg_processing_time",
            "Average DNS query processing time in seconds",
            &["hostname"],
        )?;
        let dns_queries = gauge_vec(
            "adguard_num_dns_queries",
            "Number of DNS queries in the statistics window",
            &["hostname"],
        )?;
        let blocked_filtering = gauge_vec(
            "adguard_num_blocked_filtering",
            "Number of DNS queries blocked by filtering rules",
            &["hostname"],
        )?;
        let replaced_parental = gauge_vec(
            "adguard_num_replaced_parental",
            "Number of DNS queries blocked by parental control",
            &["hostname"],
        )?;
        let replaced_safebrowsing = gauge_vec(
            "adguard_num_replaced_safebrowsing",
            "Number of DNS queries blocked by safe browsing",
            &["hostname"],
        )?;
        let replaced_safesearch = gauge_vec(
            "adguard_num_replaced_safesearch",
            "Number of DNS queries rewritten by safe search",
            &["hostname"],
        )?;
        let top_queried_domains = gauge_vec(
            "adguard_top_queried_domains",
            "Query count of the most queried domains",
            &["hostname", "domain"],
        )?;
        let top_blocked_domains = gauge_vec(
            "adguard_top_blocked_domains",
            "Query count of the most blocked domains",
            &["hostname", "domain"],
        )?;
        let top_clients = gauge_vec(
            "adguard_top_clients",
            "Query count of the most active clients",
            &["hostname", "client"],
        )?;

        let query_types = gauge_vec(
            "adguard_query_types",
            "Answer records by DNS record type over the current query log window",
            &["hostname", "type"],
        )?;

        let up = gauge_vec(
            "adguard_up",
            "Whether the last scrape of the AdGuard Home instance succeeded (1) or failed (0)",
            &["hostname"],
        )?;
        let scrape_duration_seconds = gauge_vec(
            "adguard_exporter_scrape_duration_seconds",
            "Duration of the last scrape cycle in seconds",
            &["hostname"],
        )?;
        let last_scrape_timestamp_seconds = gauge_vec(
            "adguard_exporter_last_scrape_timestamp_seconds",
            "Unix timestamp of the last successful scrape cycle",
            &["hostname"],
        )?;
        let errors_total = CounterVec::new(
            Opts::new(
                "adguard_exporter_errors_total",
                "Errors while scraping AdGuard Home by endpoint and kind",
            ),
            &["hostname", "endpoint", "kind"],
        )?;

        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(protection_enabled.clone()))?;
        registry.register(Box::new(avg_processing_time.clone()))?;
        registry.register(Box::new(dns_queries.clone()))?;
        registry.register(Box::new(blocked_filtering.clone()))?;
        registry.register(Box::new(replaced_parental.clone()))?;
        registry.register(Box::new(replaced_safebrowsing.clone()))?;
        registry.register(Box::new(replaced_safesearch.clone()))?;
        registry.register(Box::new(top_queried_domains.clone()))?;
        registry.register(Box::new(top_blocked_domains.clone()))?;
        registry.register(Box::new(top_clients.clone()))?;
        registry.register(Box::new(query_types.clone()))?;
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(last_scrape_timestamp_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            running,
            protection_enabled,
            avg_processing_time,
            dns_queries,
            blocked_filtering,
            replaced_parental,
            replaced_safebrowsing,
            replaced_safesearch,
            top_queried_domains,
            top_blocked_domains,
            top_clients,
            query_types,
            up,
            scrape_duration_seconds,
            last_scrape_timestamp_seconds,
            errors_total,
        })
    }

    /// Publishes one cycle's observations for `hostname`.
    ///
    /// Top-list series that dropped out of the current ranking are removed;
    /// query types that disappeared from the log window are set to zero.
    pub fn record(&self, hostname: &str, obs: &Observation, emitted: &mut EmittedSeries) {
        let h = [hostname];
        self.running
            .with_label_values(&h)
            .set(bool_gauge(obs.status.running));
        self.protection_enabled
            .with_label_values(&h)
            .set(bool_gauge(obs.status.protection_enabled));

        let stats = &obs.stats;
        self.avg_processing_time
            .with_label_values(&h)
            .set(stats.avg_processing_time);
        self.dns_queries
            .with_label_values(&h)
            .set(stats.dns_queries as f64);
        self.blocked_filtering
            .with_label_values(&h)
            .set(stats.blocked_filtering as f64);
        self.replaced_parental
            .with_label_values(&h)
            .set(stats.parental_filtering as f64);
        self.replaced_safebrowsing
            .with_label_values(&h)
            .set(stats.safe_browsing_filtering as f64);
        self.replaced_safesearch
            .with_label_values(&h)
            .set(stats.safe_search_filtering as f64);

        let queried = Stats::ranked(&stats.top_queries).map(|(_, d, c)| (d, c));
        replace_family(
            &self.top_queried_domains,
            hostname,
            queried,
            &mut emitted.top_queried_domains,
        );
        let blocked = Stats::ranked(&stats.top_blocked).map(|(_, d, c)| (d, c));
        replace_family(
            &self.top_blocked_domains,
            hostname,
            blocked,
            &mut emitted.top_blocked_domains,
        );
        let clients = obs.top_clients.iter().map(|(c, n)| (c.as_str(), *n));
        replace_family(&self.top_clients, hostname, clients, &mut emitted.top_clients);

        let mut current = HashSet::with_capacity(obs.query_types.len());
        for (kind, count) in &obs.query_types {
            self.query_types
                .with_label_values(&[hostname, kind.as_str()])
                .set(*count as f64);
            current.insert(kind.clone());
        }
        for stale in emitted.query_types.difference(&current) {
            self.query_types
                .with_label_values(&[hostname, stale.as_str()])
                .set(0.0);
        }
        // Zeroed labels stay tracked so they keep being reported as zero.
        emitted.query_types.extend(current);
    }

    pub fn set_up(&self, hostname: &str, up: bool) {
        self.up.with_label_values(&[hostname]).set(bool_gauge(up));
    }

    pub fn record_scrape_duration(&self, hostname: &str, seconds: f64) {
        self.scrape_duration_seconds
            .with_label_values(&[hostname])
            .set(seconds);
    }

    pub fn record_scrape_timestamp(&self, hostname: &str, unix_seconds: i64) {
        self.last_scrape_timestamp_seconds
            .with_label_values(&[hostname])
            .set(unix_seconds as f64);
    }

    pub fn record_error(&self, hostname: &str, endpoint: &str, kind: &str) {
        self.errors_total
            .with_label_values(&[hostname, endpoint, kind])
            .inc();
    }
}

fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Sets the current ranked values and removes series not present anymore.
fn replace_family<'a>(
    family: &GaugeVec,
    hostname: &str,
    current: impl Iterator<Item = (&'a str, u64)>,
    emitted: &mut HashSet<String>,
) {
    let mut seen = HashSet::new();
    for (label, count) in current {
        family
            .with_label_values(&[hostname, label])
            .set(count as f64);
        seen.insert(label.to_string());
    }
    for stale in emitted.difference(&seen) {
        // Absent series are fine to ignore here.
        let _ = family.remove_label_values(&[hostname, stale.as_str()]);
    }
    *emitted = seen;
}
