// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Static per-network addresses. Node URLs are not part of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkProfile {
    pub name: &'static str,
    pub chain_id: u64,
    pub relay_url: &'static str,
    pub universal_router: Address,
    pub v2_router: Address,
}

pub const GOERLI: NetworkProfile = NetworkProfile {
    name: constants::NETWORK_GOERLI,
    chain_id: constants::CHAIN_GOERLI,
    relay_url: constants::FLASHBOTS_RELAY_GOERLI,
    universal_router: constants::UNIVERSAL_ROUTER_GOERLI,
    v2_router: constants::UNISWAP_V2_ROUTER,
};

pub const MAINNET: NetworkProfile = NetworkProfile {
    name: constants::NETWORK_MAINNET,
    chain_id: constants::CHAIN_ETHEREUM,
    relay_url: constants::FLASHBOTS_RELAY_MAINNET,
    universal_router: constants::UNIVERSAL_ROUTER_MAINNET,
    v2_router: constants::UNISWAP_V2_ROUTER,
};

pub fn network_profile(name: &str) -> Result<NetworkProfile, AppError> {
    match name.trim().to_ascii_lowercase().as_str() {
        constants::NETWORK_GOERLI => Ok(GOERLI),
        constants::NETWORK_MAINNET | "ethereum" => Ok(MAINNET),
        other => Err(AppError::Config(format!(
            "unknown network '{other}' (expected goerli or mainnet)"
        ))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    #[serde(default = "default_false")]
    pub dry_run: bool,
    pub data_dir: Option<String>,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    // Identity
    #[serde(default)]
    pub wallet_key: String,
    pub bundle_signer_key: Option<String>,

    // Endpoints
    pub http_provider_url: Option<String>,
    pub ws_provider_url: Option<String>,
    pub flashbots_relay_url: Option<String>,

    // Strategy
    /// Decimal wei string; large values do not fit the config crate's integer type.
    #[serde(default = "default_max_buy_amount_wei")]
    pub max_buy_amount_wei: String,
    #[serde(default = "default_bribe_gwei")]
    pub bribe_gwei: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_safety_margin_divisor")]
    pub safety_margin_divisor: u64,
    pub strategy_workers: Option<usize>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_resolution_timeout_ms")]
    pub resolution_timeout_ms: u64,
    #[serde(default = "default_resolution_poll_ms")]
    pub resolution_poll_ms: u64,

    // Pair cache
    pub pair_cache_path: Option<String>,
    pub pair_init_code_hash: Option<String>,
}

// Defaults
fn default_network() -> String {
    constants::NETWORK_GOERLI.to_string()
}
fn default_false() -> bool {
    false
}
fn default_metrics_port() -> u16 {
    9000
}
fn default_max_buy_amount_wei() -> String {
    constants::DEFAULT_MAX_BUY_AMOUNT_WEI.to_string()
}
fn default_bribe_gwei() -> u64 {
    constants::DEFAULT_BRIBE_GWEI
}
fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}
fn default_deadline_secs() -> u64 {
    constants::DEFAULT_DEADLINE_SECS
}
fn default_safety_margin_divisor() -> u64 {
    constants::DEFAULT_SAFETY_MARGIN_DIVISOR
}
fn default_queue_capacity() -> usize {
    4_096
}
fn default_resolution_timeout_ms() -> u64 {
    // Two slots: the target block plus one of slack.
    constants::BLOCK_TIME_SECS * 2 * 1_000
}
fn default_resolution_poll_ms() -> u64 {
    1_000
}

const DEFAULT_STRATEGY_WORKERS: usize = 32;
const DATA_DIR_ENV: &str = "DATA_DIR";

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    /// Catches misconfiguration at startup instead of on the first candidate.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        self.profile()?;
        self.http_provider_url()?;
        self.ws_provider_url()?;
        self.relay_url()?;
        self.max_buy_amount()?;
        self.pair_init_code_hash()?;
        if self.gas_limit == 0 {
            return Err(AppError::Config("gas_limit must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be positive".to_string(),
            ));
        }
        if self.resolution_poll_ms == 0 || self.resolution_timeout_ms == 0 {
            return Err(AppError::Config(
                "resolution_timeout_ms and resolution_poll_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn profile(&self) -> Result<NetworkProfile, AppError> {
        network_profile(&self.network)
    }

    pub fn http_provider_url(&self) -> Result<Url, AppError> {
        parse_endpoint("HTTP_PROVIDER_URL", self.http_provider_url.as_deref())
    }

    pub fn ws_provider_url(&self) -> Result<Url, AppError> {
        parse_endpoint("WS_PROVIDER_URL", self.ws_provider_url.as_deref())
    }

    /// Explicit relay URL, otherwise the network profile's Flashbots relay.
    pub fn relay_url(&self) -> Result<Url, AppError> {
        match non_empty(self.flashbots_relay_url.as_deref()) {
            Some(raw) => parse_endpoint("FLASHBOTS_RELAY_URL", Some(raw)),
            None => parse_endpoint("FLASHBOTS_RELAY_URL", Some(self.profile()?.relay_url)),
        }
    }

    pub fn max_buy_amount(&self) -> Result<U256, AppError> {
        let raw = self.max_buy_amount_wei.trim().replace('_', "");
        U256::from_str(&raw).map_err(|e| {
            AppError::Config(format!(
                "max_buy_amount_wei '{}' is not a wei amount: {e}",
                self.max_buy_amount_wei
            ))
        })
    }

    pub fn pair_init_code_hash(&self) -> Result<B256, AppError> {
        match non_empty(self.pair_init_code_hash.as_deref()) {
            None => Ok(constants::UNISWAP_V2_PAIR_INIT_CODE_HASH),
            Some(raw) => B256::from_str(raw)
                .map_err(|e| AppError::Config(format!("pair_init_code_hash: {e}"))),
        }
    }

    pub fn data_dir(&self) -> Option<String> {
        non_empty(self.data_dir.as_deref()).map(ToString::to_string)
    }

    /// Pair cache file, defaulting to `pairs_<network>.cache` in the data dir.
    pub fn pair_cache_path(&self) -> String {
        let raw = non_empty(self.pair_cache_path.as_deref())
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("pairs_{}.cache", self.network.trim().to_ascii_lowercase()));
        resolve_data_file(&raw, self.data_dir().as_deref())
            .to_string_lossy()
            .to_string()
    }

    pub fn wallet_signer(&self) -> Result<PrivateKeySigner, AppError> {
        parse_signer("WALLET_KEY", &self.wallet_key)
    }

    /// Relay authentication key. A fresh random identity is used when unset.
    pub fn bundle_signer(&self) -> Result<PrivateKeySigner, AppError> {
        match non_empty(self.bundle_signer_key.as_deref()) {
            Some(raw) => parse_signer("BUNDLE_SIGNER_KEY", raw),
            None => {
                tracing::warn!(
                    target: "config",
                    "BUNDLE_SIGNER_KEY not set; using an ephemeral relay identity"
                );
                Ok(PrivateKeySigner::random())
            }
        }
    }

    pub fn strategy_worker_limit(&self) -> usize {
        self.strategy_workers
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_STRATEGY_WORKERS)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }

    pub fn resolution_poll(&self) -> Duration {
        Duration::from_millis(self.resolution_poll_ms)
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Relative paths land in the data dir: explicit setting, then `DATA_DIR`, then `./data`.
/// A leading `data/` component is not doubled.
fn resolve_data_file(raw: &str, data_dir: Option<&str>) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    let base = data_dir
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var(DATA_DIR_ENV)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from("data"));
    let relative = path
        .strip_prefix("data")
        .map(Path::to_path_buf)
        .unwrap_or(path);
    base.join(relative)
}

fn parse_endpoint(key: &str, raw: Option<&str>) -> Result<Url, AppError> {
    let raw = non_empty(raw).ok_or_else(|| AppError::Config(format!("{key} is missing")))?;
    Url::parse(raw).map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))
}

fn parse_signer(key: &str, raw: &str) -> Result<PrivateKeySigner, AppError> {
    PrivateKeySigner::from_str(raw.trim())
        .map_err(|e| AppError::Config(format!("{key} is not a valid private key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn base_settings() -> GlobalSettings {
        GlobalSettings {
            network: default_network(),
            debug: false,
            log_json: false,
            dry_run: false,
            data_dir: Some("/var/lib/sandwich".to_string()),
            metrics_port: default_metrics_port(),
            wallet_key: KEY.to_string(),
            bundle_signer_key: None,
            http_provider_url: Some("http://localhost:8545".to_string()),
            ws_provider_url: Some("ws://localhost:8546".to_string()),
            flashbots_relay_url: None,
            max_buy_amount_wei: default_max_buy_amount_wei(),
            bribe_gwei: default_bribe_gwei(),
            gas_limit: default_gas_limit(),
            deadline_secs: default_deadline_secs(),
            safety_margin_divisor: default_safety_margin_divisor(),
            strategy_workers: None,
            queue_capacity: default_queue_capacity(),
            resolution_timeout_ms: default_resolution_timeout_ms(),
            resolution_poll_ms: default_resolution_poll_ms(),
            pair_cache_path: None,
            pair_init_code_hash: None,
        }
    }

    #[test]
    fn defaults_validate() {
        let settings = base_settings();
        settings.validate().expect("valid");
        assert_eq!(settings.profile().unwrap(), GOERLI);
        assert_eq!(
            settings.max_buy_amount().unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(
            settings.pair_init_code_hash().unwrap(),
            constants::UNISWAP_V2_PAIR_INIT_CODE_HASH
        );
        assert_eq!(settings.strategy_worker_limit(), 32);
        assert_eq!(settings.relay_url().unwrap().as_str(), "https://relay-goerli.flashbots.net/");
    }

    #[test]
    fn missing_wallet_key_is_config_error() {
        let mut settings = base_settings();
        settings.wallet_key = "  ".to_string();
        assert!(matches!(settings.validate(), Err(AppError::Config(msg)) if msg.contains("WALLET_KEY")));
    }

    #[test]
    fn missing_ws_endpoint_is_config_error() {
        let mut settings = base_settings();
        settings.ws_provider_url = None;
        assert!(matches!(settings.validate(), Err(AppError::Config(msg)) if msg.contains("WS_PROVIDER_URL")));
    }

    #[test]
    fn unknown_network_rejected() {
        assert!(network_profile("sepolia").is_err());
        assert_eq!(network_profile(" Mainnet ").unwrap(), MAINNET);
        let mut settings = base_settings();
        settings.network = "holesky".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn malformed_amount_and_hash_rejected() {
        let mut settings = base_settings();
        settings.max_buy_amount_wei = "one ether".to_string();
        assert!(settings.validate().is_err());

        let mut settings = base_settings();
        settings.max_buy_amount_wei = "2_000_000".to_string();
        assert_eq!(settings.max_buy_amount().unwrap(), U256::from(2_000_000u64));

        settings.pair_init_code_hash = Some("0x1234".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn pair_cache_defaults_per_network_under_data_dir() {
        let mut settings = base_settings();
        assert_eq!(
            settings.pair_cache_path(),
            "/var/lib/sandwich/pairs_goerli.cache"
        );
        settings.network = "mainnet".to_string();
        assert_eq!(
            settings.pair_cache_path(),
            "/var/lib/sandwich/pairs_mainnet.cache"
        );
        settings.pair_cache_path = Some("/tmp/custom.json".to_string());
        assert_eq!(settings.pair_cache_path(), "/tmp/custom.json");
        settings.pair_cache_path = Some("data/pairs.json".to_string());
        assert_eq!(settings.pair_cache_path(), "/var/lib/sandwich/pairs.json");
    }

    #[test]
    fn relay_override_and_signers() {
        let mut settings = base_settings();
        settings.flashbots_relay_url = Some("https://relay.example.org".to_string());
        assert_eq!(settings.relay_url().unwrap().host_str(), Some("relay.example.org"));

        let wallet = settings.wallet_signer().unwrap();
        settings.bundle_signer_key = Some(KEY.to_string());
        assert_eq!(settings.bundle_signer().unwrap().address(), wallet.address());

        settings.bundle_signer_key = None;
        assert_ne!(settings.bundle_signer().unwrap().address(), wallet.address());
    }

    #[test]
    fn zero_workers_fall_back_to_default() {
        let mut settings = base_settings();
        settings.strategy_workers = Some(0);
        assert_eq!(settings.strategy_worker_limit(), 32);
        settings.strategy_workers = Some(4);
        assert_eq!(settings.strategy_worker_limit(), 4);
    }
}
