// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::{AppError, EvaluationError};
use crate::infrastructure::network::chain::ChainReader;
use crate::infrastructure::network::relay::{BundleRelay, SimulationReport};
use crate::services::strategy::amm::ReservePair;
use crate::services::strategy::bundles::{BundleAssembler, BundleLeg, BundlePlan};
use crate::services::strategy::decode::{CandidateOpportunity, classify};
use crate::services::strategy::pairs::PoolAddressResolver;
use crate::services::strategy::solver::{SandwichQuote, optimal_front_run, quote_sandwich};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::eth::Transaction;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, timeout};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Universal Router the victims call.
    pub universal_router: Address,
    pub wrapped_native: Address,
    pub max_buy_amount: U256,
    pub safety_margin_divisor: u64,
    pub dry_run: bool,
    pub resolution_timeout: Duration,
    pub resolution_poll: Duration,
}

/// Terminal state of one submitted (or refused) bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BundleOutcome {
    Included {
        target_block: u64,
        bundle_hash: String,
    },
    /// A sender's nonce moved past its bundle transaction; the bundle can never land.
    NotIncludedStale {
        target_block: u64,
        bundle_hash: String,
    },
    NotIncludedTimeout {
        target_block: u64,
        bundle_hash: String,
    },
    /// `index` is `None` when the relay refused the simulation as a whole.
    SimulationRejected {
        index: Option<usize>,
        reason: String,
    },
    RelayRejected(String),
    /// Dry run: simulation passed and nothing was sent.
    SimulatedOnly { target_block: u64 },
}

impl BundleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BundleOutcome::Included { .. } => "included",
            BundleOutcome::NotIncludedStale { .. } => "not_included_stale",
            BundleOutcome::NotIncludedTimeout { .. } => "not_included_timeout",
            BundleOutcome::SimulationRejected { .. } => "simulation_rejected",
            BundleOutcome::RelayRejected(_) => "relay_rejected",
            BundleOutcome::SimulatedOnly { .. } => "simulated_only",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SandwichReport {
    pub victim: B256,
    pub token: Address,
    pub quote: SandwichQuote,
    pub outcome: BundleOutcome,
}

/// Evaluate, build, simulate, submit and track one candidate at a time.
pub struct SandwichPipeline {
    chain: Arc<dyn ChainReader>,
    relay: Arc<dyn BundleRelay>,
    pairs: Arc<PoolAddressResolver>,
    assembler: BundleAssembler,
    config: PipelineConfig,
}

impl SandwichPipeline {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        relay: Arc<dyn BundleRelay>,
        pairs: Arc<PoolAddressResolver>,
        assembler: BundleAssembler,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chain,
            relay,
            pairs,
            assembler,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch a pending transaction by hash and run it through the pipeline.
    pub async fn evaluate_hash(&self, hash: B256) -> Result<SandwichReport, EvaluationError> {
        let tx = self
            .chain
            .transaction_by_hash(hash)
            .await
            .map_err(|e| EvaluationError::DataUnavailable(e.to_string()))?
            .ok_or_else(|| EvaluationError::DataUnavailable(format!("tx {hash:#x} not found")))?;
        self.evaluate(&tx).await
    }

    pub async fn evaluate(&self, tx: &Transaction) -> Result<SandwichReport, EvaluationError> {
        let plan = self.plan(tx).await?;
        let outcome = self.execute(&plan).await?;
        Ok(SandwichReport {
            victim: plan.victim_hash(),
            token: plan.token,
            quote: plan.quote,
            outcome,
        })
    }

    /// Decode, price, size and sign. No relay traffic.
    pub async fn plan(&self, tx: &Transaction) -> Result<BundlePlan, EvaluationError> {
        let candidate = classify(tx, self.config.universal_router, self.config.wrapped_native)?;
        tracing::debug!(
            target: "strategy",
            victim = %candidate.victim_hash(),
            token = %candidate.token_to_capture,
            amount_in = %candidate.amount_in,
            min_out = %candidate.min_amount_out,
            "Candidate accepted"
        );

        let quote = self.price(&candidate).await?;
        let nonce = self
            .chain
            .pending_nonce(self.assembler.address())
            .await
            .map_err(|e| EvaluationError::DataUnavailable(e.to_string()))?;

        self.assembler
            .build(&candidate, &quote, nonce, unix_now())
            .map_err(|e| match e {
                AppError::Signing(_) => EvaluationError::App(e),
                other => EvaluationError::Build(other.to_string()),
            })
    }

    async fn price(&self, candidate: &CandidateOpportunity) -> Result<SandwichQuote, EvaluationError> {
        let weth = self.config.wrapped_native;
        let token = candidate.token_to_capture;
        let pair = self.pairs.resolve(weth, token);
        let raw = self
            .chain
            .pair_reserves(pair)
            .await
            .map_err(|e| EvaluationError::DataUnavailable(e.to_string()))?;
        let reserves = ReservePair::oriented(weth, token, raw.reserve0, raw.reserve1);

        let buy = optimal_front_run(
            reserves,
            candidate.amount_in,
            candidate.min_amount_out,
            self.config.max_buy_amount,
            self.config.safety_margin_divisor,
        );
        if buy.is_zero() {
            return Err(EvaluationError::Unprofitable(
                "victim slippage leaves no room to front-run".into(),
            ));
        }

        let quote = quote_sandwich(reserves, buy, candidate.amount_in)?;
        if quote.attacker_tokens_out.is_zero() {
            return Err(EvaluationError::Unprofitable("buy too small to move tokens".into()));
        }
        let Some(profit) = quote.profit else {
            return Err(EvaluationError::Unprofitable(format!(
                "round trip returns {} for {}",
                quote.sell_amount_out, quote.buy_amount
            )));
        };
        tracing::info!(
            target: "strategy",
            victim = %candidate.victim_hash(),
            %pair,
            buy = %quote.buy_amount,
            tokens = %quote.attacker_tokens_out,
            sell = %quote.sell_amount_out,
            %profit,
            "Sandwich priced"
        );
        Ok(quote)
    }

    /// Simulate at the next block, then submit and wait unless this is a dry run.
    pub async fn execute(&self, plan: &BundlePlan) -> Result<BundleOutcome, EvaluationError> {
        let sim_block = self.next_block().await?;
        let report = self.relay.simulate(plan.raw_txs(), sim_block).await?;
        match report {
            SimulationReport::Reverted { index, reason } => {
                tracing::warn!(
                    target: "strategy",
                    victim = %plan.victim_hash(),
                    index,
                    leg = ?BundleLeg::from_index(index),
                    reason = %reason,
                    "Simulation reverted; bundle dropped"
                );
                return Ok(BundleOutcome::SimulationRejected {
                    index: Some(index),
                    reason,
                });
            }
            SimulationReport::Error(reason) => {
                tracing::warn!(target: "strategy", reason = %reason, "Simulation refused; bundle dropped");
                return Ok(BundleOutcome::SimulationRejected {
                    index: None,
                    reason,
                });
            }
            SimulationReport::Success {
                total_gas_used,
                coinbase_diff,
            } => {
                tracing::debug!(
                    target: "strategy",
                    block = sim_block,
                    gas_used = ?total_gas_used,
                    coinbase_diff = ?coinbase_diff,
                    "Simulation passed"
                );
            }
        }

        if self.config.dry_run {
            tracing::info!(
                target: "strategy",
                victim = %plan.victim_hash(),
                block = sim_block,
                txs = plan.raw_txs().len(),
                bytes = plan.total_bytes(),
                "Dry-run: bundle simulated, not sent"
            );
            return Ok(BundleOutcome::SimulatedOnly {
                target_block: sim_block,
            });
        }

        let target_block = self.next_block().await?;
        let bundle_hash = match self.relay.send_bundle(plan.raw_txs(), target_block).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(target: "strategy", error = %e, "Relay refused bundle");
                return Ok(BundleOutcome::RelayRejected(e.to_string()));
            }
        };

        let outcome = match timeout(
            self.config.resolution_timeout,
            self.await_resolution(plan, target_block, &bundle_hash),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => BundleOutcome::NotIncludedTimeout {
                target_block,
                bundle_hash: bundle_hash.clone(),
            },
        };

        match &outcome {
            BundleOutcome::Included { .. } => {
                tracing::info!(target: "strategy", block = target_block, bundle_hash = %bundle_hash, "Bundle included");
            }
            BundleOutcome::NotIncludedStale { .. } => {
                tracing::info!(
                    target: "strategy",
                    block = target_block,
                    bundle_hash = %bundle_hash,
                    "Bundle not included: transaction has been confirmed already"
                );
                self.report_stats(&bundle_hash, target_block).await;
            }
            _ => {
                tracing::info!(target: "strategy", block = target_block, bundle_hash = %bundle_hash, "Bundle not included");
                self.report_stats(&bundle_hash, target_block).await;
            }
        }
        Ok(outcome)
    }

    async fn next_block(&self) -> Result<u64, EvaluationError> {
        let head = self
            .chain
            .block_number()
            .await
            .map_err(|e| EvaluationError::DataUnavailable(e.to_string()))?;
        Ok(head + 1)
    }

    /// Poll until the target block exists, then classify. Read errors are retried on
    /// the next poll; the caller's timeout bounds the whole wait.
    async fn await_resolution(
        &self,
        plan: &BundlePlan,
        target_block: u64,
        bundle_hash: &str,
    ) -> BundleOutcome {
        loop {
            match self.chain.block_transaction_hashes(target_block).await {
                Ok(Some(hashes)) => {
                    let landed = plan.tx_hashes().iter().all(|h| hashes.contains(h));
                    if landed {
                        return BundleOutcome::Included {
                            target_block,
                            bundle_hash: bundle_hash.to_string(),
                        };
                    }
                    if self.is_stale(plan).await {
                        return BundleOutcome::NotIncludedStale {
                            target_block,
                            bundle_hash: bundle_hash.to_string(),
                        };
                    }
                    return BundleOutcome::NotIncludedTimeout {
                        target_block,
                        bundle_hash: bundle_hash.to_string(),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "strategy", error = %e, block = target_block, "Target block read failed");
                }
            }
            sleep(self.config.resolution_poll).await;
        }
    }

    /// Whether any sender already mined a transaction at or past its bundle nonce.
    async fn is_stale(&self, plan: &BundlePlan) -> bool {
        for entry in plan.senders() {
            match self.chain.latest_nonce(entry.sender).await {
                Ok(next) if next > entry.nonce => return true,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(target: "strategy", error = %e, sender = %entry.sender, "Nonce read failed");
                }
            }
        }
        false
    }

    /// Best effort: failures are logged at debug and otherwise ignored.
    async fn report_stats(&self, bundle_hash: &str, target_block: u64) {
        match self.relay.bundle_stats(bundle_hash, target_block).await {
            Ok(stats) => tracing::info!(target: "relay", bundle_hash, stats = %stats, "Bundle stats"),
            Err(e) => tracing::debug!(target: "relay", error = %e, "Bundle stats unavailable"),
        }
        match self.relay.user_stats(target_block).await {
            Ok(stats) => tracing::info!(target: "relay", stats = %stats, "User stats"),
            Err(e) => tracing::debug!(target: "relay", error = %e, "User stats unavailable"),
        }
    }
}

/// Seconds since the epoch; swap deadlines are relative to it.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
