//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the monitored instances and available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let mut targets = String::new();
    for target in &state.health_stats.targets {
        let (class, label) = if target.is_up() {
            ("up", "up")
        } else {
            ("down", "down")
        };
        writeln!(
            targets,
            r#"        <li><code>{}</code> <span class="{}">{}</span></li>"#,
            html_escape(&target.hostname),
            class,
            label
        )
        .ok();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AdGuard Home Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #68bc71;
            padding-bottom: 15px;
        }}
        .up {{ color: #2e7d32; font-weight: 600; }}
        .down {{ color: #c62828; font-weight: 600; }}
        .endpoint-list li {{ margin: 10px 0; }}
        .footer {{
            margin-top: 40px;
            padding-top: 20px;
            border-top: 1px solid #ddd;
            color: #666;
            font-size: 0.9em;
            text-align: center;
        }}
        code {{
            background: #e9ecef;
            padding: 2px 6px;
            border-radius: 3px;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>AdGuard Home Exporter</h1>
    <p>Version {version}, up {uptime}</p>

    <h2>Instances</h2>
    <ul>
{targets}    </ul>

    <h2>Endpoints</h2>
    <ul class="endpoint-list">
        <li><a href="/metrics">/metrics</a> Prometheus metrics</li>
        <li><a href="/health">/health</a> Scrape health per instance (text)</li>
        <li><a href="/config">/config</a> Effective configuration (text)</li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        targets = targets,
        footer = FOOTER_TEXT
    );

    Html(html)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
