// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::consensus::Transaction as ConsensusTxTrait;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::rpc::types::eth::Transaction;
use alloy::sol;
use alloy_sol_types::{SolCall, SolType};
use thiserror::Error;

use crate::domain::constants::{
    UR_CMD_V2_SWAP_EXACT_IN, UR_COMMAND_TYPE_MASK, UR_RECIPIENT_ADDRESS_THIS,
    UR_RECIPIENT_MSG_SENDER, UR_THREE_HOP_INPUT_WORDS,
};
use crate::services::strategy::routers::{UniversalRouter, UniversalRouterDeadline};

sol! {
    struct V2SwapExactInParams {
        address recipient;
        uint256 amountIn;
        uint256 amountOutMin;
        address[] path;
        bool payerIsUser;
    }
}

const WORD: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// `MSG_SENDER` sentinel: output goes back to the caller.
    Caller,
    /// `ADDRESS_THIS` sentinel: output stays at the router for a later command.
    Router,
    Explicit(Address),
}

impl Recipient {
    fn from_word(recipient: Address) -> Self {
        let raw = U256::from_be_slice(recipient.as_slice());
        if raw == U256::from(UR_RECIPIENT_MSG_SENDER) {
            Recipient::Caller
        } else if raw == U256::from(UR_RECIPIENT_ADDRESS_THIS) {
            Recipient::Router
        } else {
            Recipient::Explicit(recipient)
        }
    }
}

/// One `V2_SWAP_EXACT_IN` segment of a Universal Router command stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapIntent {
    pub recipient: Recipient,
    pub amount_in: U256,
    pub min_amount_out: U256,
    /// Either empty (unsupported shape) or exactly two hops.
    pub path: Vec<Address>,
}

#[derive(Clone, Debug)]
pub struct CandidateOpportunity {
    pub victim_tx: Transaction,
    /// Native value attached to the victim's call.
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub token_to_capture: Address,
}

impl CandidateOpportunity {
    pub fn victim_hash(&self) -> B256 {
        self.victim_tx.tx_hash()
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("contract creation")]
    ContractCreation,
    #[error("zero native value")]
    ZeroValue,
    #[error("destination is not the universal router")]
    NotRouter,
    #[error("call data is not a universal router execute")]
    UndecodableCall,
    #[error("no V2_SWAP_EXACT_IN command")]
    NoV2ExactIn,
    #[error("command index {0} has no matching input")]
    MissingCommandInput(usize),
    #[error("V2_SWAP_EXACT_IN input failed to decode")]
    UndecodableSwapInput,
    #[error("path is not a two-hop path")]
    UnsupportedPath,
    #[error("path words disagree with decoded path")]
    PathMismatch,
    #[error("recipient is the router")]
    RecipientIsRouter,
    #[error("path does not start at wrapped native")]
    NotWrappedNativeInput,
}

/// Classify a pending transaction as a sandwich candidate.
///
/// Rejections are the common case: almost every pending transaction is something
/// else, so callers log them at debug level at most.
pub fn classify(
    tx: &Transaction,
    router: Address,
    wrapped_native: Address,
) -> Result<CandidateOpportunity, RejectReason> {
    let to = match tx.kind() {
        TxKind::Call(addr) => addr,
        TxKind::Create => return Err(RejectReason::ContractCreation),
    };
    if tx.value().is_zero() {
        return Err(RejectReason::ZeroValue);
    }
    // Address equality is byte equality, so checksum casing never matters here.
    if to != router {
        return Err(RejectReason::NotRouter);
    }

    let intent = decode_router_call(tx.input())?;
    if intent.path.len() != 2 {
        return Err(RejectReason::UnsupportedPath);
    }
    if intent.recipient == Recipient::Router {
        return Err(RejectReason::RecipientIsRouter);
    }
    if intent.path[0] != wrapped_native {
        return Err(RejectReason::NotWrappedNativeInput);
    }

    Ok(CandidateOpportunity {
        victim_tx: tx.clone(),
        amount_in: tx.value(),
        min_amount_out: intent.min_amount_out,
        token_to_capture: intent.path[1],
    })
}

/// Decode a Universal Router `execute` call down to its first `V2_SWAP_EXACT_IN`.
pub fn decode_router_call(input: &[u8]) -> Result<SwapIntent, RejectReason> {
    let (commands, inputs) = decode_execute(input)?;
    let position = find_v2_exact_in(&commands).ok_or(RejectReason::NoV2ExactIn)?;
    let blob = inputs
        .get(position)
        .ok_or(RejectReason::MissingCommandInput(position))?;
    decode_v2_exact_in(blob)
}

fn decode_execute(input: &[u8]) -> Result<(Bytes, Vec<Bytes>), RejectReason> {
    let selector: [u8; 4] = input
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or(RejectReason::UndecodableCall)?;
    match selector {
        UniversalRouter::executeCall::SELECTOR => {
            let decoded = UniversalRouter::executeCall::abi_decode(input)
                .map_err(|_| RejectReason::UndecodableCall)?;
            Ok((decoded.commands, decoded.inputs))
        }
        UniversalRouterDeadline::executeCall::SELECTOR => {
            let decoded = UniversalRouterDeadline::executeCall::abi_decode(input)
                .map_err(|_| RejectReason::UndecodableCall)?;
            Ok((decoded.commands, decoded.inputs))
        }
        _ => Err(RejectReason::UndecodableCall),
    }
}

/// Position of the first `V2_SWAP_EXACT_IN` command. Each command is one byte, so
/// the byte offset is also the index into the parallel `inputs` array.
fn find_v2_exact_in(commands: &[u8]) -> Option<usize> {
    commands
        .iter()
        .position(|cmd| cmd & UR_COMMAND_TYPE_MASK == UR_CMD_V2_SWAP_EXACT_IN)
}

/// Decode one `(recipient, amountIn, amountOutMin, path, payerIsUser)` input.
pub fn decode_v2_exact_in(blob: &[u8]) -> Result<SwapIntent, RejectReason> {
    let decoded = <V2SwapExactInParams as SolType>::abi_decode_params(blob)
        .map_err(|_| RejectReason::UndecodableSwapInput)?;

    let hops = path_hops_from_words(blob)?;
    let path = match hops {
        Some(hops) if decoded.path.len() == 2 => {
            if decoded.path != hops {
                return Err(RejectReason::PathMismatch);
            }
            hops
        }
        _ => Vec::new(),
    };

    Ok(SwapIntent {
        recipient: Recipient::from_word(decoded.recipient),
        amount_in: decoded.amountIn,
        min_amount_out: decoded.amountOutMin,
        path,
    })
}

/// The last two words of the input, trimmed to addresses. A nine-word input is a
/// three-hop path and yields no hops.
fn path_hops_from_words(blob: &[u8]) -> Result<Option<Vec<Address>>, RejectReason> {
    if blob.len() % WORD != 0 {
        return Err(RejectReason::UndecodableSwapInput);
    }
    let words: Vec<&[u8]> = blob.chunks_exact(WORD).collect();
    if words.len() == UR_THREE_HOP_INPUT_WORDS || words.len() < 2 {
        return Ok(None);
    }
    let hops = words[words.len() - 2..]
        .iter()
        .map(|word| Address::from_slice(&word[WORD - 20..]))
        .collect();
    Ok(Some(hops))
}
