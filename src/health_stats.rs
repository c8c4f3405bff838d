//! Health statistics and monitoring for the exporter.
//!
//! This module tracks per-target scrape outcomes and exporter-wide HTTP
//! statistics, and renders them as the plain-text `/health` table.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe circular buffer for tracking HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only last 10 minutes of timestamps to avoid unbounded growth
            if let Some(cutoff) = now.checked_sub(Duration::from_secs(600)) {
                while guard.front().is_some_and(|&t| t < cutoff) {
                    guard.pop_front();
                }
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            match Instant::now().checked_sub(Duration::from_secs(60)) {
                Some(cutoff) => guard.iter().filter(|&&t| t >= cutoff).count() as u64,
                None => guard.len() as u64,
            }
        } else {
            0
        }
    }
}

/// Scrape bookkeeping for one AdGuard Home instance.
pub struct TargetHealth {
    pub hostname: String,
    pub scrape_duration_seconds: Stat,
    pub success_count: AtomicU64,
    pub failure_count: AtomicU64,
    pub decode_errors: AtomicU64,
    pub rdns_failures: AtomicU64,
    last_cycle_ok: AtomicBool,
    last_success: StdRwLock<Option<DateTime<Utc>>>,
    last_error: StdRwLock<Option<String>>,
}

impl TargetHealth {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            scrape_duration_seconds: Stat::default(),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            rdns_failures: AtomicU64::new(0),
            last_cycle_ok: AtomicBool::new(false),
            last_success: StdRwLock::new(None),
            last_error: StdRwLock::new(None),
        }
    }

    pub fn record_success(&self, duration_seconds: f64, at: DateTime<Utc>) {
        self.scrape_duration_seconds.add_sample(duration_seconds);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_ok.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_success.write() {
            *guard = Some(at);
        }
    }

    pub fn record_failure(&self, error: &str) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_ok.store(false, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_error.write() {
            *guard = Some(error.to_string());
        }
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rdns_failure(&self) {
        self.rdns_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// True once the most recent cycle completed without a transport error.
    pub fn is_up(&self) -> bool {
        self.last_cycle_ok.load(Ordering::Relaxed)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success.read().ok().and_then(|g| *g)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|g| g.clone())
    }

    pub fn success_rate(&self) -> f64 {
        let success = self.success_count.load(Ordering::Relaxed);
        let failure = self.failure_count.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }
}

/// Exporter-wide health statistics.
pub struct HealthStats {
    pub targets: Vec<Arc<TargetHealth>>,
    pub http_request_timestamps: RequestTimestamps,
    pub metrics_endpoint_calls: AtomicU64,
    pub metrics_response_size_kb: Stat,
    pub start_time: Instant,
}

impl HealthStats {
    pub fn new<I, S>(hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: hostnames
                .into_iter()
                .map(|h| Arc::new(TargetHealth::new(h)))
                .collect(),
            http_request_timestamps: RequestTimestamps::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            metrics_response_size_kb: Stat::default(),
            start_time: Instant::now(),
        }
    }

    pub fn target(&self, hostname: &str) -> Option<Arc<TargetHealth>> {
        self.targets.iter().find(|t| t.hostname == hostname).cloned()
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_metrics_endpoint_call(&self, response_bytes: usize) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
        self.metrics_response_size_kb
            .add_sample(response_bytes as f64 / 1024.0);
    }

    /// True when every target's most recent cycle succeeded.
    pub fn all_targets_up(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(|t| t.is_up())
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let left_col = 32usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();

        for target in &self.targets {
            let (sd_cur, sd_avg, sd_max, sd_min, _) = target.scrape_duration_seconds.snapshot();
            let success = target.success_count.load(Ordering::Relaxed);
            let failure = target.failure_count.load(Ordering::Relaxed);

            writeln!(out).ok();
            writeln!(out, "TARGET {}", target.hostname).ok();
            writeln!(out, "{}", "-".repeat(7 + target.hostname.len())).ok();

            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                "",
                "current",
                "average",
                "max",
                "min",
                left = left_col,
                col = col_w
            )
            .ok();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                "scrape_duration (s)",
                format!("{:.3}", sd_cur),
                format!("{:.3}", sd_avg),
                format!("{:.3}", sd_max),
                format!("{:.3}", sd_min),
                left = left_col,
                col = col_w
            )
            .ok();

            writeln!(out, "{:left$} | {}", "status", if target.is_up() { "up" } else { "down" }, left = left_col).ok();
            writeln!(out, "{:left$} | {}", "successful scrapes", success, left = left_col).ok();
            writeln!(out, "{:left$} | {}", "failed scrapes", failure, left = left_col).ok();
            writeln!(
                out,
                "{:left$} | {:.1}",
                "success_rate (%)",
                target.success_rate(),
                left = left_col
            )
            .ok();
            writeln!(
                out,
                "{:left$} | {}",
                "decode errors",
                target.decode_errors.load(Ordering::Relaxed),
                left = left_col
            )
            .ok();
            writeln!(
                out,
                "{:left$} | {}",
                "rdns failures",
                target.rdns_failures.load(Ordering::Relaxed),
                left = left_col
            )
            .ok();
            writeln!(
                out,
                "{:left$} | {}",
                "last success",
                target
                    .last_success()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "N/A".into()),
                left = left_col
            )
            .ok();
            if let Some(error) = target.last_error() {
                writeln!(out, "{:left$} | {}", "last error", error, left = left_col).ok();
            }
        }

        let (rs_cur, rs_avg, rs_max, _, _) = self.metrics_response_size_kb.snapshot();
        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();
        writeln!(
            out,
            "{:left$} | {}",
            "requests (last minute)",
            self.http_request_timestamps.count_last_minute(),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {}",
            "metrics endpoint calls",
            self.metrics_endpoint_calls.load(Ordering::Relaxed),
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} | {:.1} / {:.1} / {:.1}",
            "response size KB (cur/avg/max)",
            rs_cur,
            rs_avg,
            rs_max,
            left = left_col
        )
        .ok();

        out
    }
}
