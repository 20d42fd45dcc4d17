// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use crate::infrastructure::data::pair_store::{PairEntry, PairStore};
use alloy::primitives::{Address, B256, keccak256};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Deterministic Uniswap V2 pair address for `(a, b)` in either order.
pub fn compute_pair_address(factory: Address, a: Address, b: Address, init_code_hash: B256) -> Address {
    let (token0, token1) = sort_tokens(a, b);
    let mut packed = [0u8; 40];
    packed[..20].copy_from_slice(token0.as_slice());
    packed[20..].copy_from_slice(token1.as_slice());
    factory.create2(keccak256(packed), init_code_hash)
}

/// Numeric order, as the factory sorts before deploying.
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b { (a, b) } else { (b, a) }
}

/// Ordered cache key: checksummed `a` followed by checksummed `b`.
pub fn pair_key(a: Address, b: Address) -> String {
    format!("{a}{b}")
}

/// CREATE2 pair resolver with a write-behind persisted cache.
pub struct PoolAddressResolver {
    factory: Address,
    init_code_hash: B256,
    cache: DashMap<String, Address>,
    store: Arc<dyn PairStore>,
    dirty: Notify,
    flush_lock: Mutex<()>,
}

impl PoolAddressResolver {
    pub fn new(factory: Address, init_code_hash: B256, store: Arc<dyn PairStore>) -> Self {
        Self {
            factory,
            init_code_hash,
            cache: DashMap::new(),
            store,
            dirty: Notify::new(),
            flush_lock: Mutex::new(()),
        }
    }

    /// Seed the cache from the store. Returns the number of entries loaded.
    pub fn load(&self) -> Result<usize, AppError> {
        let entries = self.store.load()?;
        let count = entries.len();
        for (key, pair) in entries {
            self.cache.insert(key, pair);
        }
        tracing::info!(target: "pairs", entries = count, "Pair cache loaded");
        Ok(count)
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Cached lookup, computing and caching both key orderings on a miss.
    pub fn resolve(&self, a: Address, b: Address) -> Address {
        if let Some(hit) = self.cache.get(&pair_key(a, b)) {
            return *hit;
        }
        let pair = compute_pair_address(self.factory, a, b, self.init_code_hash);
        let fresh = self.cache.insert(pair_key(a, b), pair).is_none();
        self.cache.insert(pair_key(b, a), pair);
        if fresh {
            tracing::debug!(target: "pairs", token_a = %a, token_b = %b, %pair, "Pair resolved");
            self.dirty.notify_one();
        }
        pair
    }

    /// Sorted copy of the cache, as written to the store.
    pub fn snapshot(&self) -> Vec<PairEntry> {
        let mut entries: Vec<PairEntry> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort_by(|x, y| x.0.cmp(&y.0));
        entries
    }

    /// Rewrite the full snapshot. Writers are serialized.
    pub async fn flush(&self) -> Result<(), AppError> {
        let _guard = self.flush_lock.lock().await;
        let entries = self.snapshot();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.persist(&entries))
            .await
            .map_err(|e| AppError::Persistence(format!("pair cache flush task failed: {e}")))?
    }

    /// Background writer: flushes after new entries appear and once more on shutdown.
    /// Write failures are logged and never reach the resolving caller.
    pub fn spawn_flusher(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        if let Err(e) = self.flush().await {
                            tracing::warn!(target: "pairs", error = %e, "Final pair cache flush failed");
                        }
                        break;
                    }
                    _ = self.dirty.notified() => {
                        match self.flush().await {
                            Ok(()) => tracing::debug!(target: "pairs", entries = self.len(), "Pair cache flushed"),
                            Err(e) => tracing::warn!(target: "pairs", error = %e, "Pair cache flush failed"),
                        }
                    }
                }
            }
        })
    }
}
