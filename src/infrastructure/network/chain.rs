// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::infrastructure::network::provider::HttpProvider;
use crate::services::strategy::routers::{UniV2Router, UniswapV2Pair};
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::Transaction;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

const ROUTER_LOOKUP_ATTEMPTS: usize = 3;

/// Raw `getReserves()` output in pair order (`reserve0` belongs to the smaller token).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawReserves {
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Node reads used while evaluating and tracking one sandwich.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn block_number(&self) -> Result<u64, AppError>;
    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, AppError>;
    async fn pair_reserves(&self, pair: Address) -> Result<RawReserves, AppError>;
    /// Next nonce including pending transactions.
    async fn pending_nonce(&self, account: Address) -> Result<u64, AppError>;
    /// Next nonce as of the latest mined block.
    async fn latest_nonce(&self, account: Address) -> Result<u64, AppError>;
    /// `None` while the block is not yet available.
    async fn block_transaction_hashes(&self, number: u64) -> Result<Option<Vec<B256>>, AppError>;
}

#[derive(Clone)]
pub struct RpcChain {
    provider: HttpProvider,
}

impl RpcChain {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    /// `(WETH(), factory())` as reported by the V2 router. Startup only, so
    /// transient node errors are retried with backoff.
    pub async fn router_context(&self, router: Address) -> Result<(Address, Address), AppError> {
        let contract = UniV2Router::new(router, self.provider.clone());
        let mut delay = Duration::from_millis(250);
        let mut attempt = 1;
        loop {
            let lookup = match (contract.WETH().call().await, contract.factory().call().await) {
                (Ok(weth), Ok(factory)) => Ok((weth, factory)),
                (Err(e), _) | (_, Err(e)) => Err(e.to_string()),
            };
            match lookup {
                Ok(context) => return Ok(context),
                Err(e) if attempt < ROUTER_LOOKUP_ATTEMPTS => {
                    tracing::debug!(target: "config", attempt, error = %e, "Router context lookup failed");
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::Initialization(format!(
                        "router {router:#x} lookup failed after {attempt} attempts: {e}"
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ChainReader for RpcChain {
    async fn block_number(&self) -> Result<u64, AppError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| AppError::Connection(format!("eth_blockNumber failed: {e}")))
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, AppError> {
        self.provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| AppError::Connection(format!("eth_getTransactionByHash failed: {e}")))
    }

    async fn pair_reserves(&self, pair: Address) -> Result<RawReserves, AppError> {
        let reserves = UniswapV2Pair::new(pair, self.provider.clone())
            .getReserves()
            .call()
            .await
            .map_err(|e| AppError::Connection(format!("getReserves on {pair:#x} failed: {e}")))?;
        Ok(RawReserves {
            reserve0: U256::from(reserves.reserve0),
            reserve1: U256::from(reserves.reserve1),
        })
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(account)
            .pending()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch pending nonce: {}", e)))
    }

    async fn latest_nonce(&self, account: Address) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(account)
            .latest()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    async fn block_transaction_hashes(&self, number: u64) -> Result<Option<Vec<B256>>, AppError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| AppError::Connection(format!("block {number} fetch failed: {e}")))?;
        Ok(block.map(|b| b.transactions.hashes().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::provider::ConnectionFactory;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Node stub answering every request with 503; returns its URL and request counter.
    async fn failing_node() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 16 * 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn pending_nonce_reads_once() {
        let (url, hits) = failing_node().await;
        let chain = RpcChain::new(ConnectionFactory::http(&url).unwrap());
        let res = chain.pending_nonce(Address::repeat_byte(0x11)).await;
        assert!(matches!(res, Err(AppError::Connection(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn router_context_gives_up_after_attempts() {
        let (url, hits) = failing_node().await;
        let chain = RpcChain::new(ConnectionFactory::http(&url).unwrap());
        let res = chain.router_context(Address::repeat_byte(0x22)).await;
        assert!(matches!(res, Err(AppError::Initialization(msg)) if msg.contains("3 attempts")));
        // WETH() and factory() per attempt.
        assert_eq!(hits.load(Ordering::SeqCst), 2 * ROUTER_LOOKUP_ATTEMPTS);
    }
}
