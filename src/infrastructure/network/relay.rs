// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{FLASHBOTS_MAX_BYTES, FLASHBOTS_MAX_TXS};
use crate::domain::error::AppError;
use alloy::primitives::{Bytes, keccak256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde_json::{Value, json};
use std::time::Duration;

const RELAY_TIMEOUT_MS: u64 = 2_500;
const RELAY_MAX_ATTEMPTS: u64 = 2;

/// Result of an `eth_callBundle` dry run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationReport {
    Success {
        total_gas_used: Option<u64>,
        coinbase_diff: Option<String>,
    },
    /// First transaction that errored or reverted, by bundle index.
    Reverted { index: usize, reason: String },
    /// The relay refused to simulate at all.
    Error(String),
}

#[async_trait]
pub trait BundleRelay: Send + Sync {
    async fn simulate(&self, raw_txs: &[Bytes], block: u64) -> Result<SimulationReport, AppError>;
    /// Returns the relay's bundle hash.
    async fn send_bundle(&self, raw_txs: &[Bytes], block: u64) -> Result<String, AppError>;
    async fn bundle_stats(&self, bundle_hash: &str, block: u64) -> Result<Value, AppError>;
    async fn user_stats(&self, block: u64) -> Result<Value, AppError>;
}

/// Flashbots-style relay speaking signed JSON-RPC over HTTPS.
pub struct FlashbotsRelay {
    client: reqwest::Client,
    relay_url: String,
    signer: PrivateKeySigner,
}

impl FlashbotsRelay {
    pub fn new(relay_url: String, signer: PrivateKeySigner) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url,
            signer,
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let body_bytes = serde_json::to_vec(&body)
            .map_err(|e| AppError::Relay(format!("{method} encode failed: {e}")))?;
        let sig_header = self.sign_request(&body_bytes)?;

        let mut attempts = 0u64;
        loop {
            attempts += 1;
            let resp = self
                .client
                .post(&self.relay_url)
                .header("Content-Type", "application/json")
                .header(
                    "X-Flashbots-Signature",
                    HeaderValue::from_str(&sig_header).map_err(|e| {
                        AppError::Relay(format!("Signature header invalid: {}", e))
                    })?,
                )
                .body(body_bytes.clone())
                .timeout(Duration::from_millis(RELAY_TIMEOUT_MS))
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) if attempts < RELAY_MAX_ATTEMPTS => {
                    tracing::warn!(
                        target: "relay",
                        relay = %self.relay_url,
                        method,
                        error = %e,
                        attempt = attempts,
                        "Relay POST failed, retrying"
                    );
                    continue;
                }
                Err(e) => {
                    return Err(AppError::Connection(format!("Relay POST failed: {}", e)));
                }
            };

            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(AppError::Relay(format!(
                    "{method} rejected: {status} body={body_text}"
                )));
            }
            tracing::trace!(target: "relay", method, body = %body_text, "Relay response");
            return serde_json::from_str(&body_text)
                .map_err(|e| AppError::Relay(format!("{method} returned invalid JSON: {e}")));
        }
    }

    fn sign_request(&self, body_bytes: &[u8]) -> Result<String, AppError> {
        // EIP-191 over the hex string of keccak256(body), not over the raw hash.
        let message_hash = keccak256(body_bytes).to_string();
        let signature = self
            .signer
            .sign_message_sync(message_hash.as_bytes())
            .map_err(|e| AppError::Signing(format!("Relay auth signing failed: {}", e)))?;
        Ok(format!(
            "{}:0x{}",
            self.signer.address(),
            hex::encode(signature.as_bytes())
        ))
    }
}

#[async_trait]
impl BundleRelay for FlashbotsRelay {
    async fn simulate(&self, raw_txs: &[Bytes], block: u64) -> Result<SimulationReport, AppError> {
        check_bundle_limits(raw_txs)?;
        let params = json!([{
            "txs": encode_txs(raw_txs),
            "blockNumber": format!("0x{:x}", block),
            "stateBlockNumber": "latest",
        }]);
        let response = self.call("eth_callBundle", params).await?;
        Ok(parse_simulation(&response))
    }

    async fn send_bundle(&self, raw_txs: &[Bytes], block: u64) -> Result<String, AppError> {
        check_bundle_limits(raw_txs)?;
        let params = json!([{
            "txs": encode_txs(raw_txs),
            "blockNumber": format!("0x{:x}", block),
        }]);
        let response = self.call("eth_sendBundle", params).await?;
        if let Some(message) = rpc_error_message(&response) {
            return Err(AppError::Relay(format!("eth_sendBundle refused: {message}")));
        }
        let bundle_hash = extract_bundle_id(&response).ok_or_else(|| {
            AppError::Relay(format!("eth_sendBundle returned no bundle hash: {response}"))
        })?;
        tracing::info!(
            target: "relay",
            relay = %self.relay_url,
            block,
            txs = raw_txs.len(),
            bundle_hash = %bundle_hash,
            "Bundle submitted"
        );
        Ok(bundle_hash)
    }

    async fn bundle_stats(&self, bundle_hash: &str, block: u64) -> Result<Value, AppError> {
        let params = json!([{
            "bundleHash": bundle_hash,
            "blockNumber": format!("0x{:x}", block),
        }]);
        result_or_error(self.call("flashbots_getBundleStatsV2", params).await?)
    }

    async fn user_stats(&self, block: u64) -> Result<Value, AppError> {
        let params = json!([{ "blockNumber": format!("0x{:x}", block) }]);
        result_or_error(self.call("flashbots_getUserStatsV2", params).await?)
    }
}

/// Refuse bundles that exceed Flashbots size limits before contacting the relay.
pub fn check_bundle_limits(raw_txs: &[Bytes]) -> Result<(), AppError> {
    let bundle_bytes: usize = raw_txs.iter().map(|r| r.len()).sum();
    if raw_txs.len() > FLASHBOTS_MAX_TXS || bundle_bytes > FLASHBOTS_MAX_BYTES {
        return Err(AppError::Relay(format!(
            "Bundle exceeds Flashbots limits: {} txs, {} bytes (max {} tx / {} bytes)",
            raw_txs.len(),
            bundle_bytes,
            FLASHBOTS_MAX_TXS,
            FLASHBOTS_MAX_BYTES
        )));
    }
    Ok(())
}

fn encode_txs(raw_txs: &[Bytes]) -> Vec<String> {
    raw_txs
        .iter()
        .map(|raw| format!("0x{}", hex::encode(raw)))
        .collect()
}

fn rpc_error_message(response: &Value) -> Option<String> {
    let error = response.get("error")?;
    Some(
        error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

fn result_or_error(response: Value) -> Result<Value, AppError> {
    if let Some(message) = rpc_error_message(&response) {
        return Err(AppError::Relay(message));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| AppError::Relay("response has no result".into()))
}

/// Interpret an `eth_callBundle` response.
pub fn parse_simulation(response: &Value) -> SimulationReport {
    if let Some(message) = rpc_error_message(response) {
        return SimulationReport::Error(message);
    }
    let Some(result) = response.get("result") else {
        return SimulationReport::Error("response has no result".into());
    };

    let results = result
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (index, tx) in results.iter().enumerate() {
        let failure = tx
            .get("revert")
            .or_else(|| tx.get("error"))
            .filter(|v| !v.is_null());
        if let Some(reason) = failure {
            let reason = reason
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| reason.to_string());
            return SimulationReport::Reverted { index, reason };
        }
    }

    SimulationReport::Success {
        total_gas_used: result.get("totalGasUsed").and_then(Value::as_u64),
        coinbase_diff: result
            .get("coinbaseDiff")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

pub fn extract_bundle_id(response: &Value) -> Option<String> {
    let result = response.get("result")?;
    if let Some(s) = result.as_str() {
        return Some(s.to_string());
    }
    if let Some(obj) = result.as_object() {
        for key in ["bundleHash", "bundle_hash", "hash", "bundleId", "uuid"] {
            if let Some(v) = obj.get(key).and_then(|v| v.as_str()) {
                return Some(v.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> FlashbotsRelay {
        // Nothing listens here; tests only exercise paths that never reach the network.
        FlashbotsRelay::new("http://127.0.0.1:9".to_string(), PrivateKeySigner::random())
    }

    #[test]
    fn signature_header_is_address_and_65_byte_sig() {
        let relay = relay();
        let header = relay.sign_request(br#"{"id":1}"#).expect("sign");
        let (addr, sig) = header.split_once(':').expect("separator");
        assert_eq!(addr, relay.signer.address().to_string());
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 130);

        let expected = relay
            .signer
            .sign_message_sync(keccak256(br#"{"id":1}"#).to_string().as_bytes())
            .expect("sign");
        assert_eq!(sig, format!("0x{}", hex::encode(expected.as_bytes())));
    }

    #[tokio::test]
    async fn oversized_bundles_are_refused_before_any_request() {
        let relay = relay();
        let too_big = vec![Bytes::from(vec![0u8; FLASHBOTS_MAX_BYTES + 1])];
        let err = relay.simulate(&too_big, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Relay(msg) if msg.contains("Bundle exceeds Flashbots limits")));

        let too_many = vec![Bytes::from(vec![0u8; 1]); FLASHBOTS_MAX_TXS + 1];
        let err = relay.send_bundle(&too_many, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Relay(msg) if msg.contains("Bundle exceeds Flashbots limits")));
    }

    #[test]
    fn limits_are_inclusive() {
        assert!(check_bundle_limits(&[Bytes::from(vec![0u8; FLASHBOTS_MAX_BYTES])]).is_ok());
        assert!(check_bundle_limits(&vec![Bytes::from(vec![0u8; 1]); FLASHBOTS_MAX_TXS]).is_ok());
    }

    #[test]
    fn simulation_reports_first_failing_index() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "results": [
                    {"txHash": "0x01", "gasUsed": 120000},
                    {"txHash": "0x02", "gasUsed": 90000},
                    {"txHash": "0x03", "error": "execution reverted", "revert": "UniswapV2: K"},
                    {"txHash": "0x04", "error": "execution reverted"}
                ],
                "totalGasUsed": 300000
            }
        });
        assert_eq!(
            parse_simulation(&response),
            SimulationReport::Reverted {
                index: 2,
                reason: "UniswapV2: K".to_string()
            }
        );
    }

    #[test]
    fn simulation_success_and_top_level_error() {
        let ok = json!({
            "result": {
                "results": [{"txHash": "0x01", "gasUsed": 21000}],
                "totalGasUsed": 21000,
                "coinbaseDiff": "420000000000000"
            }
        });
        assert_eq!(
            parse_simulation(&ok),
            SimulationReport::Success {
                total_gas_used: Some(21000),
                coinbase_diff: Some("420000000000000".to_string())
            }
        );

        let refused = json!({"error": {"code": -32000, "message": "nonce too low"}});
        assert_eq!(
            parse_simulation(&refused),
            SimulationReport::Error("nonce too low".to_string())
        );
    }

    #[test]
    fn extract_bundle_id_accepts_string_and_object_results() {
        assert_eq!(
            extract_bundle_id(&json!({"result": "0xabc"})).as_deref(),
            Some("0xabc")
        );
        assert_eq!(
            extract_bundle_id(&json!({"result": {"bundleHash": "0xdef"}})).as_deref(),
            Some("0xdef")
        );
        assert_eq!(
            extract_bundle_id(&json!({"result": {"uuid": "uuid-123"}})).as_deref(),
            Some("uuid-123")
        );
        assert_eq!(extract_bundle_id(&json!({"result": {}})), None);
    }
}
