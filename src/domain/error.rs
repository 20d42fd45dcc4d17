// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::services::strategy::amm::PriceModelError;
use crate::services::strategy::decode::RejectReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Why a single candidate evaluation stopped before reaching the relay.
///
/// None of these are retried: by the time a retry could run the chain has moved
/// on, so the next pending transaction drives a fresh evaluation instead.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("not a sandwichable swap: {0}")]
    DecodeRejected(RejectReason),

    #[error("chain data unavailable: {0}")]
    DataUnavailable(String),

    #[error("unprofitable: {0}")]
    Unprofitable(String),

    #[error("price model: {0}")]
    PriceModel(#[from] PriceModelError),

    #[error("bundle build failed: {0}")]
    Build(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl EvaluationError {
    /// Expected, high-frequency aborts that should stay out of error logs.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            EvaluationError::DecodeRejected(_) | EvaluationError::Unprofitable(_)
        )
    }
}

impl From<RejectReason> for EvaluationError {
    fn from(reason: RejectReason) -> Self {
        EvaluationError::DecodeRejected(reason)
    }
}
