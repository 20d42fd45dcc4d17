// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const NOISY_MODULES: &str =
    "h2=info,hyper=info,hyper_util=info,reqwest=info,tokio_tungstenite=info,alloy_transport_http=info,alloy_pubsub=info,alloy_rpc_client=info";

/// Bare levels (e.g. "debug") get quiet defaults for transport crates.
/// Directive strings containing ',' or '=' are used as-is.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return format!("info,{NOISY_MODULES}");
    }
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{normalized},{NOISY_MODULES}")
    }
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .compact();
        subscriber.with(fmt_layer).try_init()
    };
    if installed.is_err() {
        // A subscriber is already set (tests, embedding); keep it.
        return;
    }

    let base = spec.split(',').next().unwrap_or("info");
    tracing::info!(
        base,
        format = if json_format { "json" } else { "compact" },
        "Logging initialized"
    );
}
