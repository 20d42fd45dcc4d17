// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::services::strategy::stats::StrategyStats;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Plaintext counters on `/`, the same counters as JSON on `/stats`.
pub async fn spawn_metrics_server(
    port: u16,
    stats: Arc<StrategyStats>,
    shutdown: CancellationToken,
) -> Option<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!("Metrics server failed to bind: {}", e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!("Metrics server listening on {}", addr);
    }

    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((mut socket, _)) => {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let req = String::from_utf8_lossy(&buf[..n]).to_string();
                    let route = req
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/");

                    let (content_type, body) = if route.starts_with("/stats") {
                        ("application/json", render_stats_json(&stats))
                    } else {
                        ("text/plain", render_metrics(&stats))
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
                        content_type,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    tracing::warn!("Metrics accept error: {}", e);
                }
            }
        }
    });

    local
}

fn counters(stats: &StrategyStats) -> [(&'static str, u64); 13] {
    [
        ("observed", stats.observed.load(Ordering::Relaxed)),
        ("processed", stats.processed.load(Ordering::Relaxed)),
        ("skip_decode", stats.skip_decode.load(Ordering::Relaxed)),
        ("skip_unprofitable", stats.skip_unprofitable.load(Ordering::Relaxed)),
        ("skip_data_unavailable", stats.skip_data_unavailable.load(Ordering::Relaxed)),
        ("failed", stats.failed.load(Ordering::Relaxed)),
        ("simulation_rejected", stats.simulation_rejected.load(Ordering::Relaxed)),
        ("relay_rejected", stats.relay_rejected.load(Ordering::Relaxed)),
        ("simulated_only", stats.simulated_only.load(Ordering::Relaxed)),
        ("submitted", stats.submitted.load(Ordering::Relaxed)),
        ("included", stats.included.load(Ordering::Relaxed)),
        ("not_included_stale", stats.not_included_stale.load(Ordering::Relaxed)),
        ("not_included_timeout", stats.not_included_timeout.load(Ordering::Relaxed)),
    ]
}

fn render_metrics(stats: &StrategyStats) -> String {
    let mut body = String::new();
    for (name, value) in counters(stats) {
        body.push_str(&format!(
            "# TYPE sandwich_{name} counter\nsandwich_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# TYPE ingest_queue_dropped counter\ningest_queue_dropped {}\n",
        stats.ingest_queue_dropped.load(Ordering::Relaxed)
    ));
    body
}

fn render_stats_json(stats: &StrategyStats) -> String {
    let mut map = serde_json::Map::new();
    for (name, value) in counters(stats) {
        map.insert(name.to_string(), json!(value));
    }
    map.insert(
        "ingest_queue_dropped".to_string(),
        json!(stats.ingest_queue_dropped.load(Ordering::Relaxed)),
    );
    serde_json::Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_endpoint_serves() {
        let stats = Arc::new(StrategyStats::default());
        stats.included.fetch_add(2, Ordering::Relaxed);
        let shutdown = CancellationToken::new();

        let addr = spawn_metrics_server(0, stats.clone(), shutdown.clone())
            .await
            .expect("bind metrics");

        let body = reqwest::get(format!("http://127.0.0.1:{}", addr.port()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("sandwich_included 2"));

        let json: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/stats", addr.port()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["included"], 2);
        shutdown.cancel();
    }
}
