//! Integration tests for the scrape cycle.
//!
//! Each test starts a small axum server that answers the four AdGuard Home
//! endpoints with canned JSON, then drives `ScrapeClient::scrape_once`
//! against it and inspects the published metrics.

use adguard_exporter::config::{Protocol, TargetConfig};
use adguard_exporter::health_stats::TargetHealth;
use adguard_exporter::metrics::AdguardMetrics;
use adguard_exporter::scraper::ScrapeClient;
use axum::extract::{RawQuery, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::{routing::get, Router};
use prometheus::Registry;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Canned responses and request log of a fake AdGuard Home instance.
#[derive(Default)]
struct FakeState {
    status: String,
    stats: String,
    querylog: String,
    /// `None` answers the client lookup with HTTP 500.
    rdns: Option<String>,
    unavailable: bool,
    auth_headers: Vec<Option<String>>,
    rdns_queries: Vec<String>,
}

type Fake = Arc<Mutex<FakeState>>;

fn respond(
    fake: &Fake,
    headers: &HeaderMap,
    body: impl FnOnce(&FakeState) -> Option<String>,
) -> (StatusCode, String) {
    let mut state = fake.lock().unwrap();
    state.auth_headers.push(
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    );
    if state.unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, String::new());
    }
    match body(&state) {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
    }
}

async fn status(State(fake): State<Fake>, headers: HeaderMap) -> (StatusCode, String) {
    respond(&fake, &headers, |s| Some(s.status.clone()))
}

async fn stats(State(fake): State<Fake>, headers: HeaderMap) -> (StatusCode, String) {
    respond(&fake, &headers, |s| Some(s.stats.clone()))
}

async fn querylog(State(fake): State<Fake>, headers: HeaderMap) -> (StatusCode, String) {
    respond(&fake, &headers, |s| Some(s.querylog.clone()))
}

async fn clients_find(
    State(fake): State<Fake>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> (StatusCode, String) {
    fake.lock()
        .unwrap()
        .rdns_queries
        .push(query.unwrap_or_default());
    respond(&fake, &headers, |s| s.rdns.clone())
}

async fn spawn_fake(state: FakeState) -> (u16, Fake) {
    let fake = Arc::new(Mutex::new(state));
    let app = Router::new()
        .route("/control/status", get(status))
        .route("/control/stats", get(stats))
        .route("/control/querylog", get(querylog))
        .route("/control/clients/find", get(clients_find))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (port, fake)
}

fn status_body(running: bool, protection_enabled: bool) -> String {
    json!({ "running": running, "protection_enabled": protection_enabled }).to_string()
}

fn stats_body(dns_queries: u64) -> String {
    json!({
        "num_dns_queries": dns_queries,
        "num_blocked_filtering": 30,
        "num_replaced_parental": 2,
        "num_replaced_safebrowsing": 1,
        "num_replaced_safesearch": 0,
        "avg_processing_time": 0.015,
        "top_queried_domains": [{"example.com": 50}, {"example.org": 20}],
        "top_blocked_domains": [{"ads.example.net": 25}],
        "top_clients": [{"192.168.1.1": 80}, {"laptop": 15}]
    })
    .to_string()
}

fn querylog_body() -> String {
    json!({
        "oldest": "",
        "data": [
            {"answer": [{"type": "A", "value": "93.184.216.34", "ttl": 300}]},
            {"answer": [{"type": "A", "value": "93.184.216.35", "ttl": 300},
                        {"type": "AAAA", "value": "2606:2800::1", "ttl": 300}]},
            {"answer": [{"type": "TYPE65", "value": {"Hdr": {"Name": "example.com.", "Rrtype": 65, "Class": 1, "Ttl": 60}}}]},
            {"answer": null},
            {}
        ]
    })
    .to_string()
}

fn rdns_body() -> String {
    json!([{"192.168.1.1": {"name": "router.lan"}}]).to_string()
}

fn healthy_fake() -> FakeState {
    FakeState {
        status: status_body(true, true),
        stats: stats_body(100),
        querylog: querylog_body(),
        rdns: Some(rdns_body()),
        ..Default::default()
    }
}

fn target(hostname: &str, port: u16, password: Option<&str>) -> TargetConfig {
    TargetConfig {
        protocol: Protocol::Http,
        hostname: hostname.to_string(),
        port,
        username: "admin".into(),
        password: password.map(String::from),
        interval: Duration::from_secs(10),
        log_limit: 100,
        rdns_enabled: true,
        request_timeout: Duration::from_secs(5),
    }
}

fn scrape_client(
    target: TargetConfig,
    metrics: &AdguardMetrics,
) -> (ScrapeClient, Arc<TargetHealth>) {
    let health = Arc::new(TargetHealth::new(target.hostname.clone()));
    let client = ScrapeClient::new(target, metrics.clone(), health.clone()).unwrap();
    (client, health)
}

const HOST: &str = "127.0.0.1";

#[tokio::test]
async fn test_scrape_publishes_all_families() {
    let (port, _fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, health) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();

    let h = [HOST];
    assert_eq!(metrics.up.with_label_values(&h).get(), 1.0);
    assert_eq!(metrics.running.with_label_values(&h).get(), 1.0);
    assert_eq!(metrics.protection_enabled.with_label_values(&h).get(), 1.0);
    assert_eq!(metrics.dns_queries.with_label_values(&h).get(), 100.0);
    assert_eq!(metrics.blocked_filtering.with_label_values(&h).get(), 30.0);
    assert_eq!(metrics.replaced_parental.with_label_values(&h).get(), 2.0);
    assert_eq!(metrics.avg_processing_time.with_label_values(&h).get(), 0.015);
    assert_eq!(
        metrics
            .top_queried_domains
            .with_label_values(&[HOST, "example.com"])
            .get(),
        50.0
    );
    assert_eq!(
        metrics
            .top_blocked_domains
            .with_label_values(&[HOST, "ads.example.net"])
            .get(),
        25.0
    );
    assert_eq!(
        metrics
            .top_clients
            .with_label_values(&[HOST, "router.lan"])
            .get(),
        80.0
    );
    assert_eq!(
        metrics.top_clients.with_label_values(&[HOST, "laptop"]).get(),
        15.0
    );
    assert_eq!(metrics.query_types.with_label_values(&[HOST, "A"]).get(), 2.0);
    assert_eq!(metrics.query_types.with_label_values(&[HOST, "AAAA"]).get(), 1.0);
    assert_eq!(
        metrics.query_types.with_label_values(&[HOST, "TYPE65"]).get(),
        1.0
    );
    assert!(health.is_up());
    assert!(
        metrics
            .last_scrape_timestamp_seconds
            .with_label_values(&h)
            .get()
            > 0.0
    );
}

#[tokio::test]
async fn test_rdns_query_only_lists_ip_sources() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();

    let queries = fake.lock().unwrap().rdns_queries.clone();
    assert_eq!(queries, vec!["ip0=192.168.1.1".to_string()]);
}

#[tokio::test]
async fn test_rdns_resolves_ip_ranked_after_a_name() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    {
        let mut state = fake.lock().unwrap();
        state.stats = json!({
            "num_dns_queries": 100,
            "top_clients": [{"laptop": 90}, {"192.168.1.1": 80}]
        })
        .to_string();
    }
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();

    let queries = fake.lock().unwrap().rdns_queries.clone();
    assert_eq!(queries, vec!["ip0=192.168.1.1".to_string()]);
    assert_eq!(
        metrics
            .top_clients
            .with_label_values(&[HOST, "router.lan"])
            .get(),
        80.0
    );
    assert_eq!(
        metrics.top_clients.with_label_values(&[HOST, "laptop"]).get(),
        90.0
    );
}

#[tokio::test]
async fn test_counter_rotation_end_to_end() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    let mut exported = Vec::new();
    for raw in [100, 150, 40, 90] {
        fake.lock().unwrap().stats = stats_body(raw);
        client.scrape_once().await.unwrap();
        exported.push(metrics.dns_queries.with_label_values(&[HOST]).get());
    }

    assert_eq!(exported, vec![100.0, 150.0, 0.0, 50.0]);
}

#[tokio::test]
async fn test_unavailable_target_keeps_previous_values() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, health) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();
    fake.lock().unwrap().unavailable = true;
    assert!(client.scrape_once().await.is_err());

    assert_eq!(metrics.up.with_label_values(&[HOST]).get(), 0.0);
    assert_eq!(metrics.dns_queries.with_label_values(&[HOST]).get(), 100.0);
    assert_eq!(
        metrics
            .errors_total
            .with_label_values(&[HOST, "status", "status"])
            .get(),
        1.0
    );
    assert!(!health.is_up());
    assert!(health.last_error().is_some());

    // Recovery on the next cycle.
    fake.lock().unwrap().unavailable = false;
    client.scrape_once().await.unwrap();
    assert_eq!(metrics.up.with_label_values(&[HOST]).get(), 1.0);
}

#[tokio::test]
async fn test_connection_refused_marks_target_down() {
    // Bind and immediately drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, health) = scrape_client(target(HOST, port, None), &metrics);

    let err = client.scrape_once().await.unwrap_err();
    assert_eq!(err.kind(), "transport");
    assert_eq!(metrics.up.with_label_values(&[HOST]).get(), 0.0);
    assert!(!health.is_up());
}

#[tokio::test]
async fn test_decode_error_is_tolerated() {
    let (port, _fake) = spawn_fake(FakeState {
        status: "not json".into(),
        ..healthy_fake()
    })
    .await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, health) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();

    assert_eq!(metrics.up.with_label_values(&[HOST]).get(), 1.0);
    assert_eq!(metrics.running.with_label_values(&[HOST]).get(), 0.0);
    assert_eq!(metrics.dns_queries.with_label_values(&[HOST]).get(), 100.0);
    assert_eq!(
        metrics
            .errors_total
            .with_label_values(&[HOST, "status", "decode"])
            .get(),
        1.0
    );
    assert_eq!(
        health
            .decode_errors
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_undecodable_stats_is_not_a_rotation() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    let mut exported = Vec::new();
    for body in [stats_body(100), "not json".to_string(), stats_body(150)] {
        fake.lock().unwrap().stats = body;
        client.scrape_once().await.unwrap();
        assert_eq!(metrics.up.with_label_values(&[HOST]).get(), 1.0);
        exported.push(metrics.dns_queries.with_label_values(&[HOST]).get());
    }

    assert_eq!(exported, vec![100.0, 0.0, 150.0]);
    assert_eq!(
        metrics
            .errors_total
            .with_label_values(&[HOST, "stats", "decode"])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn test_odd_answer_shapes_keep_query_log() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    fake.lock().unwrap().querylog = json!({
        "data": [
            {"answer": [{"type": "A", "value": "1.1.1.1"}]},
            {"answer": [{"type": 28, "value": "::1"}, "AAAA"]}
        ]
    })
    .to_string();
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();

    assert_eq!(metrics.query_types.with_label_values(&[HOST, "A"]).get(), 1.0);
    assert_eq!(
        metrics
            .errors_total
            .with_label_values(&[HOST, "querylog", "decode"])
            .get(),
        0.0
    );
}

#[tokio::test]
async fn test_rdns_failure_is_isolated_per_target() {
    let (port_a, _fake_a) = spawn_fake(FakeState {
        rdns: None,
        ..healthy_fake()
    })
    .await;
    let (port_b, _fake_b) = spawn_fake(healthy_fake()).await;

    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client_a, health_a) = scrape_client(target("127.0.0.1", port_a, None), &metrics);
    let (mut client_b, _) = scrape_client(target("localhost", port_b, None), &metrics);

    client_a.scrape_once().await.unwrap();
    client_b.scrape_once().await.unwrap();

    assert_eq!(
        metrics
            .top_clients
            .with_label_values(&["127.0.0.1", "192.168.1.1"])
            .get(),
        80.0
    );
    assert_eq!(
        metrics
            .top_clients
            .with_label_values(&["localhost", "router.lan"])
            .get(),
        80.0
    );
    assert_eq!(metrics.up.with_label_values(&["127.0.0.1"]).get(), 1.0);
    assert_eq!(
        health_a
            .rdns_failures
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_rdns_disabled_skips_lookup() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let mut cfg = target(HOST, port, None);
    cfg.rdns_enabled = false;
    let (mut client, _) = scrape_client(cfg, &metrics);

    client.scrape_once().await.unwrap();

    assert!(fake.lock().unwrap().rdns_queries.is_empty());
    assert_eq!(
        metrics
            .top_clients
            .with_label_values(&[HOST, "192.168.1.1"])
            .get(),
        80.0
    );
}

#[tokio::test]
async fn test_basic_auth_only_with_password() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();

    let (mut anonymous, _) = scrape_client(target(HOST, port, None), &metrics);
    anonymous.scrape_once().await.unwrap();
    assert!(fake
        .lock()
        .unwrap()
        .auth_headers
        .iter()
        .all(|h| h.is_none()));

    fake.lock().unwrap().auth_headers.clear();
    let (mut authed, _) = scrape_client(target(HOST, port, Some("secret")), &metrics);
    authed.scrape_once().await.unwrap();
    // base64("admin:secret")
    assert!(fake
        .lock()
        .unwrap()
        .auth_headers
        .iter()
        .all(|h| h.as_deref() == Some("Basic YWRtaW46c2VjcmV0")));
}

#[tokio::test]
async fn test_query_types_zeroed_after_leaving_window() {
    let (port, fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (mut client, _) = scrape_client(target(HOST, port, None), &metrics);

    client.scrape_once().await.unwrap();
    fake.lock().unwrap().querylog = json!({
        "data": [{"answer": [{"type": "A", "value": "1.1.1.1"}]}]
    })
    .to_string();
    client.scrape_once().await.unwrap();

    assert_eq!(metrics.query_types.with_label_values(&[HOST, "A"]).get(), 1.0);
    assert_eq!(metrics.query_types.with_label_values(&[HOST, "AAAA"]).get(), 0.0);
    assert_eq!(
        metrics.query_types.with_label_values(&[HOST, "TYPE65"]).get(),
        0.0
    );
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let (port, _fake) = spawn_fake(healthy_fake()).await;
    let registry = Registry::new();
    let metrics = AdguardMetrics::new(&registry).unwrap();
    let (client, health) = scrape_client(target(HOST, port, None), &metrics);

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(client.run(rx));

    // The first tick fires immediately.
    for _ in 0..50 {
        if health.is_up() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(health.is_up());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scrape loop did not stop")
        .unwrap();
}
