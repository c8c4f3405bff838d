//! Check command implementation.
//!
//! Runs one scrape cycle against every configured AdGuard Home instance and
//! prints what the exporter would publish.

use anyhow::{bail, Context};
use prometheus::Registry;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{validate_effective_config, Config};
use crate::health_stats::TargetHealth;
use crate::metrics::AdguardMetrics;
use crate::scraper::ScrapeClient;

/// Scrapes each target once and reports the outcome.
pub async fn command_check(config: &Config, verbose: bool) -> anyhow::Result<()> {
    println!("🔍 AdGuard Home Exporter - Connectivity Check");
    println!("=============================================");

    validate_effective_config(config)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("configuration invalid")?;
    let targets = config.targets().context("configuration invalid")?;

    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).context("failed to register metrics")?;

    let mut failed = Vec::new();
    for target in targets {
        let base_url = target.base_url();
        println!("\n🌐 {}", base_url);

        let health = Arc::new(TargetHealth::new(target.hostname.clone()));
        let mut client = ScrapeClient::new(target, metrics.clone(), health.clone())
            .with_context(|| format!("failed to create client for {}", base_url))?;

        match client.scrape_once().await {
            Ok(obs) => {
                println!(
                    "   ✅ running={} protection_enabled={}",
                    obs.status.running, obs.status.protection_enabled
                );
                println!("   📊 {}", obs.stats.summary());
                let decode_errors = health
                    .decode_errors
                    .load(Ordering::Relaxed);
                if decode_errors > 0 {
                    println!("   ⚠️  {} response(s) could not be decoded", decode_errors);
                }
                if health.rdns_failures.load(Ordering::Relaxed) > 0 {
                    println!("   ⚠️  reverse DNS lookup failed, raw client addresses used");
                }

                if verbose {
                    println!("   Top clients:");
                    for (client, count) in &obs.top_clients {
                        println!("      {:<40} {}", client, count);
                    }
                    let mut types: Vec<_> = obs.query_types.iter().collect();
                    types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                    println!("   Query types:");
                    for (kind, count) in types {
                        println!("      {:<10} {}", kind, count);
                    }
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                failed.push(base_url);
            }
        }
    }

    println!("\n📋 Summary:");
    if failed.is_empty() {
        println!("   ✅ All instances reachable");
        Ok(())
    } else {
        bail!("{} instance(s) unreachable: {}", failed.len(), failed.join(", "))
    }
}
