// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::network::TransactionResponse;
use alloy::primitives::B256;
use alloy::rpc::types::eth::Transaction;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// One observed pending transaction, full or hash-only depending on the subscription.
#[derive(Clone, Debug)]
pub enum PendingWork {
    Transaction {
        tx: Box<Transaction>,
        received_at: Instant,
    },
    Hash {
        hash: B256,
        received_at: Instant,
    },
}

impl PendingWork {
    pub fn hash(&self) -> B256 {
        match self {
            PendingWork::Transaction { tx, .. } => tx.tx_hash(),
            PendingWork::Hash { hash, .. } => *hash,
        }
    }

    pub fn received_at(&self) -> Instant {
        match self {
            PendingWork::Transaction { received_at, .. } | PendingWork::Hash { received_at, .. } => {
                *received_at
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PushResult {
    pub dropped_oldest: bool,
}

/// Bounded queue between ingest and workers. Full pushes evict the oldest item;
/// workers take the newest first.
pub struct WorkQueue {
    capacity: usize,
    queue: Mutex<VecDeque<PendingWork>>,
    notify: Notify,
}

pub type SharedWorkQueue = Arc<WorkQueue>;

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn push(&self, work: PendingWork) -> PushResult {
        let mut queue = self.queue.lock().await;
        let dropped_oldest = if queue.len() >= self.capacity {
            queue.pop_front();
            true
        } else {
            false
        };
        queue.push_back(work);
        drop(queue);
        self.notify.notify_one();
        PushResult { dropped_oldest }
    }

    pub async fn pop_latest(&self, shutdown: &CancellationToken) -> Option<PendingWork> {
        loop {
            let notified = self.notify.notified();
            {
                let mut queue = self.queue.lock().await;
                if let Some(work) = queue.pop_back() {
                    return Some(work);
                }
            }
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = notified => {}
            }
        }
    }
}
