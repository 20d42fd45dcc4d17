// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::EvaluationError;
use crate::services::strategy::pipeline::BundleOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

const SUMMARY_EVERY: u64 = 50;

#[derive(Debug, Default)]
pub struct StrategyStats {
    pub observed: AtomicU64,
    pub processed: AtomicU64,
    pub skip_decode: AtomicU64,
    pub skip_unprofitable: AtomicU64,
    pub skip_data_unavailable: AtomicU64,
    pub failed: AtomicU64,
    pub simulation_rejected: AtomicU64,
    pub relay_rejected: AtomicU64,
    pub simulated_only: AtomicU64,
    pub submitted: AtomicU64,
    pub included: AtomicU64,
    pub not_included_stale: AtomicU64,
    pub not_included_timeout: AtomicU64,
    pub ingest_queue_dropped: AtomicU64,
}

impl StrategyStats {
    pub fn record_outcome(&self, outcome: &BundleOutcome) {
        let counter = match outcome {
            BundleOutcome::Included { .. } => &self.included,
            BundleOutcome::NotIncludedStale { .. } => &self.not_included_stale,
            BundleOutcome::NotIncludedTimeout { .. } => &self.not_included_timeout,
            BundleOutcome::SimulationRejected { .. } => &self.simulation_rejected,
            BundleOutcome::RelayRejected(_) => &self.relay_rejected,
            BundleOutcome::SimulatedOnly { .. } => &self.simulated_only,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if matches!(
            outcome,
            BundleOutcome::Included { .. }
                | BundleOutcome::NotIncludedStale { .. }
                | BundleOutcome::NotIncludedTimeout { .. }
        ) {
            self.submitted.fetch_add(1, Ordering::Relaxed);
        }
        self.bump_processed();
    }

    pub fn record_error(&self, err: &EvaluationError) {
        let counter = match err {
            EvaluationError::DecodeRejected(_) => &self.skip_decode,
            EvaluationError::Unprofitable(_) => &self.skip_unprofitable,
            EvaluationError::DataUnavailable(_) => &self.skip_data_unavailable,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bump_processed();
    }

    fn bump_processed(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % SUMMARY_EVERY == 0 {
            self.log_summary();
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            target: "strategy_summary",
            observed = self.observed.load(Ordering::Relaxed),
            processed = self.processed.load(Ordering::Relaxed),
            skip_decode = self.skip_decode.load(Ordering::Relaxed),
            skip_unprofitable = self.skip_unprofitable.load(Ordering::Relaxed),
            skip_data_unavailable = self.skip_data_unavailable.load(Ordering::Relaxed),
            failed = self.failed.load(Ordering::Relaxed),
            simulation_rejected = self.simulation_rejected.load(Ordering::Relaxed),
            relay_rejected = self.relay_rejected.load(Ordering::Relaxed),
            submitted = self.submitted.load(Ordering::Relaxed),
            included = self.included.load(Ordering::Relaxed),
            stale = self.not_included_stale.load(Ordering::Relaxed),
            timeout = self.not_included_timeout.load(Ordering::Relaxed),
            dropped = self.ingest_queue_dropped.load(Ordering::Relaxed),
            "Strategy loop summary"
        );
    }
}
