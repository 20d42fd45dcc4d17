// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::providers::Provider;
use clap::Parser;
use oxidity_sandwich::app::config::GlobalSettings;
use oxidity_sandwich::app::logging::setup_logging;
use oxidity_sandwich::domain::constants::wrapped_native_for_chain;
use oxidity_sandwich::domain::error::AppError;
use oxidity_sandwich::infrastructure::data::pair_store::JsonFilePairStore;
use oxidity_sandwich::infrastructure::network::chain::RpcChain;
use oxidity_sandwich::infrastructure::network::mempool::MempoolScanner;
use oxidity_sandwich::infrastructure::network::provider::ConnectionFactory;
use oxidity_sandwich::infrastructure::network::relay::FlashbotsRelay;
use oxidity_sandwich::services::metrics::spawn_metrics_server;
use oxidity_sandwich::services::strategy::bundles::BundleAssembler;
use oxidity_sandwich::services::strategy::engine::StrategyEngine;
use oxidity_sandwich::services::strategy::pairs::PoolAddressResolver;
use oxidity_sandwich::services::strategy::pipeline::{PipelineConfig, SandwichPipeline};
use oxidity_sandwich::services::strategy::stats::StrategyStats;
use oxidity_sandwich::services::strategy::work_queue::WorkQueue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Universal Router V2 sandwich searcher")]
struct Cli {
    /// Network profile: goerli or mainnet
    network: Option<String>,

    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Simulate bundles but never submit them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Metrics port (overrides config/env)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    if let Some(network) = cli.network {
        settings.network = network;
        settings.validate()?;
    }
    setup_logging(settings.log_level(), settings.log_json);

    let profile = settings.profile()?;
    let dry_run = cli.dry_run || settings.dry_run;
    let metrics_port = cli.metrics_port.unwrap_or(settings.metrics_port);

    let http_provider = ConnectionFactory::http(settings.http_provider_url()?.as_str())?;
    let ws_provider = ConnectionFactory::ws(settings.ws_provider_url()?.as_str()).await?;

    let node_chain_id = http_provider
        .get_chain_id()
        .await
        .map_err(|e| AppError::Connection(format!("chain_id detect failed: {e}")))?;
    if node_chain_id != profile.chain_id {
        return Err(AppError::Config(format!(
            "node reports chain {node_chain_id} but network '{}' expects {}",
            profile.name, profile.chain_id
        )));
    }

    let wallet_signer = settings.wallet_signer()?;
    let bundle_signer = settings.bundle_signer()?;

    let chain = Arc::new(RpcChain::new(http_provider));
    let (wrapped_native, factory) = chain.router_context(profile.v2_router).await?;
    let expected_native = wrapped_native_for_chain(profile.chain_id);
    if wrapped_native != expected_native {
        tracing::warn!(
            target: "config",
            router_weth = %wrapped_native,
            expected = %expected_native,
            "V2 router reports an unexpected wrapped native token"
        );
    }
    tracing::info!(
        target: "config",
        network = profile.name,
        chain_id = profile.chain_id,
        wallet = %wallet_signer.address(),
        universal_router = %profile.universal_router,
        v2_router = %profile.v2_router,
        %wrapped_native,
        %factory,
        dry_run,
        "Network context resolved"
    );

    let shutdown = CancellationToken::new();

    let pair_cache_path = settings.pair_cache_path();
    let pairs = Arc::new(PoolAddressResolver::new(
        factory,
        settings.pair_init_code_hash()?,
        Arc::new(JsonFilePairStore::new(&pair_cache_path)),
    ));
    let loaded = pairs.load()?;
    tracing::info!(target: "pairs", path = %pair_cache_path, loaded, "Pair cache loaded");
    let flusher = pairs.clone().spawn_flusher(shutdown.clone());

    let relay_url = settings.relay_url()?;
    let relay = Arc::new(FlashbotsRelay::new(relay_url.to_string(), bundle_signer));
    let assembler = BundleAssembler::new(
        wallet_signer,
        profile.chain_id,
        profile.v2_router,
        wrapped_native,
        settings.bribe_gwei,
        settings.gas_limit,
        settings.deadline_secs,
    );
    let pipeline = Arc::new(SandwichPipeline::new(
        chain,
        relay,
        pairs.clone(),
        assembler,
        PipelineConfig {
            universal_router: profile.universal_router,
            wrapped_native,
            max_buy_amount: settings.max_buy_amount()?,
            safety_margin_divisor: settings.safety_margin_divisor,
            dry_run,
            resolution_timeout: settings.resolution_timeout(),
            resolution_poll: settings.resolution_poll(),
        },
    ));

    let stats = Arc::new(StrategyStats::default());
    let work_queue = Arc::new(WorkQueue::new(settings.queue_capacity));
    spawn_metrics_server(metrics_port, stats.clone(), shutdown.clone()).await;

    let scanner = MempoolScanner::new(
        ws_provider,
        work_queue.clone(),
        stats.clone(),
        profile.universal_router,
        shutdown.clone(),
    );
    let engine = StrategyEngine::new(
        pipeline,
        work_queue,
        stats,
        settings.strategy_worker_limit(),
        shutdown.clone(),
    );

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c listener failed");
            return;
        }
        tracing::info!("ctrl-c received; shutting down");
        ctrl_c_shutdown.cancel();
    });

    let scanner_task = tokio::spawn(scanner.run());
    let engine_result = engine.run().await;
    shutdown.cancel();

    match scanner_task.await {
        Ok(Err(e)) => tracing::warn!(target: "mempool", error = %e, "Mempool scanner exited with error"),
        Err(e) => tracing::warn!(target: "mempool", error = %e, "Mempool scanner task join failed"),
        Ok(Ok(())) => {}
    }
    if let Err(e) = flusher.await {
        tracing::warn!(target: "pairs", error = %e, "Pair cache flusher join failed");
    }
    pairs.flush().await?;
    engine_result
}
