// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::{AppError, EvaluationError};
use crate::services::strategy::pipeline::{SandwichPipeline, SandwichReport};
use crate::services::strategy::stats::StrategyStats;
use crate::services::strategy::work_queue::{PendingWork, SharedWorkQueue};
use alloy::primitives::B256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// Per-candidate result forwarded from workers to the reporter.
#[derive(Debug)]
pub struct WorkReport {
    pub hash: B256,
    pub elapsed: Duration,
    pub result: Result<SandwichReport, EvaluationError>,
}

/// Pops pending work and evaluates each item on its own task, bounded by a semaphore.
pub struct StrategyEngine {
    pipeline: Arc<SandwichPipeline>,
    work_queue: SharedWorkQueue,
    stats: Arc<StrategyStats>,
    worker_semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl StrategyEngine {
    pub fn new(
        pipeline: Arc<SandwichPipeline>,
        work_queue: SharedWorkQueue,
        stats: Arc<StrategyStats>,
        workers: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            work_queue,
            stats,
            worker_semaphore: Arc::new(Semaphore::new(workers.max(1))),
            shutdown,
        }
    }

    pub async fn run(self) -> Result<(), AppError> {
        let config = self.pipeline.config();
        tracing::info!(
            target: "strategy",
            router = %config.universal_router,
            wrapped_native = %config.wrapped_native,
            max_buy = %config.max_buy_amount,
            margin_divisor = config.safety_margin_divisor,
            dry_run = config.dry_run,
            workers = self.worker_semaphore.available_permits(),
            "Strategy engine waiting for pending transactions"
        );

        let (report_tx, report_rx) = mpsc::channel::<WorkReport>(1024);
        let reporter = tokio::spawn(run_reporter(
            report_rx,
            self.stats.clone(),
            self.shutdown.clone(),
        ));
        let mut worker_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                joined = worker_tasks.join_next(), if !worker_tasks.is_empty() => {
                    if let Some(Err(e)) = joined {
                        tracing::warn!(target: "strategy", error = %e, "Strategy worker task failed");
                    }
                }
                work_opt = self.work_queue.pop_latest(&self.shutdown) => {
                    let Some(work) = work_opt else {
                        tracing::info!(target: "strategy", "Shutdown requested; stopping strategy work loop");
                        break;
                    };
                    let permit = match self.worker_semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            tracing::warn!(target: "strategy", error = %e, "Worker semaphore closed; requesting shutdown");
                            self.shutdown.cancel();
                            break;
                        }
                    };
                    let pipeline = self.pipeline.clone();
                    let report_tx = report_tx.clone();
                    worker_tasks.spawn(async move {
                        let _permit = permit;
                        let report = process_work(&pipeline, work).await;
                        if report_tx.send(report).await.is_err() {
                            tracing::debug!(target: "strategy", "Reporter gone; dropping work report");
                        }
                    });
                }
            }
        }

        while let Some(joined) = worker_tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(target: "strategy", error = %e, "Strategy worker task failed during shutdown");
            }
        }
        drop(report_tx);
        if let Err(e) = reporter.await {
            tracing::warn!(target: "strategy", error = %e, "Reporter task join failed");
        }
        self.stats.log_summary();
        Ok(())
    }
}

pub async fn process_work(pipeline: &SandwichPipeline, work: PendingWork) -> WorkReport {
    let hash = work.hash();
    let received_at = work.received_at();
    let result = match work {
        PendingWork::Transaction { tx, .. } => pipeline.evaluate(&tx).await,
        PendingWork::Hash { hash, .. } => pipeline.evaluate_hash(hash).await,
    };
    WorkReport {
        hash,
        elapsed: received_at.elapsed(),
        result,
    }
}

/// Logs every report and keeps the counters. Runs until all senders are dropped.
async fn run_reporter(
    mut rx: mpsc::Receiver<WorkReport>,
    stats: Arc<StrategyStats>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SUMMARY_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(report) = maybe else { break };
                record_report(&stats, &report);
            }
            _ = ticker.tick(), if !shutdown.is_cancelled() => stats.log_summary(),
        }
    }
}

pub fn record_report(stats: &StrategyStats, report: &WorkReport) {
    let elapsed_ms = report.elapsed.as_millis() as u64;
    match &report.result {
        Ok(done) => {
            stats.record_outcome(&done.outcome);
            tracing::info!(
                target: "strategy",
                victim = %done.victim,
                token = %done.token,
                outcome = done.outcome.label(),
                profit = ?done.quote.profit,
                elapsed_ms,
                "Sandwich finished"
            );
        }
        Err(e) => {
            stats.record_error(e);
            if e.is_expected() {
                tracing::trace!(target: "strategy", tx = %report.hash, reason = %e, "Skipped");
            } else if matches!(e, EvaluationError::DataUnavailable(_)) {
                tracing::debug!(target: "strategy", tx = %report.hash, error = %e, elapsed_ms, "Evaluation aborted");
            } else {
                tracing::error!(target: "strategy", tx = %report.hash, error = %e, elapsed_ms, "Strategy failed");
            }
        }
    }
}
