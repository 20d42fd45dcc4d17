// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::infrastructure::network::provider::WsProvider;
use crate::services::strategy::stats::StrategyStats;
use crate::services::strategy::work_queue::{PendingWork, SharedWorkQueue};
use alloy::consensus::Transaction as _;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::Transaction;
use futures::StreamExt;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
const SEEN_MAX: usize = 4;
#[cfg(not(test))]
const SEEN_MAX: usize = 50_000;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// First-seen filter over pending hashes; evicts the oldest entry past `capacity`.
struct SeenHashes {
    capacity: usize,
    state: Mutex<SeenState>,
}

#[derive(Default)]
struct SeenState {
    hashes: HashSet<B256>,
    order: VecDeque<B256>,
}

impl SeenHashes {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(SeenState::default()),
        }
    }

    /// `true` only the first time `hash` is offered while it is retained.
    fn insert(&self, hash: B256) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.hashes.insert(hash) {
            return false;
        }
        state.order.push_back(hash);
        if state.order.len() > self.capacity
            && let Some(oldest) = state.order.pop_front()
        {
            state.hashes.remove(&oldest);
        }
        true
    }
}

pub struct MempoolScanner {
    provider: WsProvider,
    work_queue: SharedWorkQueue,
    stats: Arc<StrategyStats>,
    router: Address,
    shutdown: CancellationToken,
    seen: SeenHashes,
}

impl MempoolScanner {
    pub fn new(
        provider: WsProvider,
        work_queue: SharedWorkQueue,
        stats: Arc<StrategyStats>,
        router: Address,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            work_queue,
            stats,
            router,
            shutdown,
            seen: SeenHashes::new(SEEN_MAX),
        }
    }

    /// Subscribe to pending transactions until shutdown, reconnecting with backoff.
    /// Full transactions are preferred; hash-only subscriptions are the fallback.
    pub async fn run(self) -> Result<(), AppError> {
        tracing::info!(target: "mempool", router = %self.router, "Mempool scanner started");

        loop {
            if self.shutdown.is_cancelled() {
                tracing::info!(target: "mempool", "Shutdown requested; stopping scanner");
                return Ok(());
            }

            match self.provider.subscribe_full_pending_transactions().await {
                Ok(sub) => {
                    tracing::info!(target: "mempool", "Subscribed to full pendingTransactions");
                    let mut stream = sub.into_stream();
                    loop {
                        tokio::select! {
                            _ = self.shutdown.cancelled() => {
                                tracing::info!(target: "mempool", "Shutdown requested; exiting pending tx stream");
                                return Ok(());
                            }
                            maybe_tx = stream.next() => {
                                let Some(tx) = maybe_tx else { break };
                                self.on_transaction(tx).await;
                            }
                        }
                    }
                    tracing::warn!(target: "mempool", "Pending tx subscription ended, retrying after backoff");
                }
                Err(e) => {
                    tracing::warn!(
                        target: "mempool",
                        error = %e,
                        "Full pending sub failed; trying hash-only subscription"
                    );
                    match self.provider.subscribe_pending_transactions().await {
                        Ok(sub) => {
                            tracing::info!(target: "mempool", "Subscribed to pending tx hashes");
                            let mut stream = sub.into_stream();
                            loop {
                                tokio::select! {
                                    _ = self.shutdown.cancelled() => {
                                        tracing::info!(target: "mempool", "Shutdown requested; exiting pending hash stream");
                                        return Ok(());
                                    }
                                    maybe_hash = stream.next() => {
                                        let Some(hash) = maybe_hash else { break };
                                        self.on_hash(hash).await;
                                    }
                                }
                            }
                            tracing::warn!(target: "mempool", "Pending hash subscription ended, retrying after backoff");
                        }
                        Err(e2) => {
                            tracing::warn!(
                                target: "mempool",
                                error = %e2,
                                "Hash-only subscription failed, retrying after backoff"
                            );
                        }
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(target: "mempool", "Shutdown requested during reconnect backoff");
                    return Ok(());
                }
                _ = sleep(RECONNECT_BACKOFF) => {}
            }
        }
    }

    async fn on_transaction(&self, tx: Transaction) {
        if !self.seen.insert(tx.tx_hash()) {
            return;
        }
        self.stats.observed.fetch_add(1, Ordering::Relaxed);
        // Cheap pre-filter; the decoder re-checks everything.
        if tx.to() != Some(self.router) || tx.value().is_zero() {
            return;
        }
        self.enqueue(PendingWork::Transaction {
            tx: Box::new(tx),
            received_at: Instant::now(),
        })
        .await;
    }

    async fn on_hash(&self, hash: B256) {
        if !self.seen.insert(hash) {
            return;
        }
        self.stats.observed.fetch_add(1, Ordering::Relaxed);
        self.enqueue(PendingWork::Hash {
            hash,
            received_at: Instant::now(),
        })
        .await;
    }

    async fn enqueue(&self, work: PendingWork) {
        let pushed = self.work_queue.push(work).await;
        if pushed.dropped_oldest {
            self.stats.ingest_queue_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "mempool",
                capacity = self.work_queue.capacity(),
                "ingest queue full; dropped oldest work item"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategy::fixtures::signed_victim_tx;
    use crate::services::strategy::work_queue::WorkQueue;
    use alloy::primitives::U256;
    use alloy::signers::local::PrivateKeySigner;
    use url::Url;

    const ROUTER: Address = Address::repeat_byte(0x11);

    fn scanner(queue: SharedWorkQueue, stats: Arc<StrategyStats>) -> MempoolScanner {
        let provider = WsProvider::new_http(Url::parse("http://localhost:8545").unwrap());
        MempoolScanner::new(provider, queue, stats, ROUTER, CancellationToken::new())
    }

    #[test]
    fn seen_hashes_dedup_and_evict_oldest() {
        let seen = SeenHashes::new(SEEN_MAX);
        let h1 = B256::from([1u8; 32]);
        let h2 = B256::from([2u8; 32]);
        assert!(seen.insert(h1));
        assert!(!seen.insert(h1));
        assert!(seen.insert(h2));
        for b in 3u8..=5 {
            assert!(seen.insert(B256::from([b; 32])));
        }
        // Window of four: h1 was evicted, h2 is still retained.
        assert!(!seen.insert(h2));
        assert!(seen.insert(h1));
    }

    #[tokio::test]
    async fn only_router_calls_with_value_are_enqueued() {
        let queue = Arc::new(WorkQueue::new(8));
        let stats = Arc::new(StrategyStats::default());
        let scanner = scanner(queue.clone(), stats.clone());
        let signer = PrivateKeySigner::random();

        let to_router = signed_victim_tx(&signer, ROUTER, U256::from(5u64), vec![1, 2, 3, 4, 5], 0);
        let elsewhere = signed_victim_tx(&signer, Address::repeat_byte(0x22), U256::from(5u64), vec![1, 2, 3, 4, 5], 1);
        let no_value = signed_victim_tx(&signer, ROUTER, U256::ZERO, vec![1, 2, 3, 4, 5], 2);

        scanner.on_transaction(to_router.clone()).await;
        scanner.on_transaction(to_router).await;
        scanner.on_transaction(elsewhere).await;
        scanner.on_transaction(no_value).await;

        assert_eq!(queue.len().await, 1);
        assert_eq!(stats.observed.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn overflow_counts_dropped_items() {
        let queue = Arc::new(WorkQueue::new(1));
        let stats = Arc::new(StrategyStats::default());
        let scanner = scanner(queue.clone(), stats.clone());

        scanner.on_hash(B256::from([7u8; 32])).await;
        scanner.on_hash(B256::from([8u8; 32])).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(stats.ingest_queue_dropped.load(Ordering::Relaxed), 1);
    }
}
