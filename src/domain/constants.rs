// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, B256, address, b256};

// Common assets
pub const WETH_MAINNET: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const WETH_GOERLI: Address = address!("B4FBF271143F4FBf7B91A5ded31805e42b2208d6");

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_GOERLI: u64 = 5;

pub const NETWORK_MAINNET: &str = "mainnet";
pub const NETWORK_GOERLI: &str = "goerli";

pub const FLASHBOTS_RELAY_MAINNET: &str = "https://relay.flashbots.net";
pub const FLASHBOTS_RELAY_GOERLI: &str = "https://relay-goerli.flashbots.net";

// Routers. The V2 router is what our own buy/sell legs go through; the
// Universal Router is what victims call.
pub const UNISWAP_V2_ROUTER: Address = address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D");
pub const UNIVERSAL_ROUTER_MAINNET: Address =
    address!("Ef1c6E67703c7BD7107eed8303Fbe6EC2554BF6B");
pub const UNIVERSAL_ROUTER_GOERLI: Address = address!("4648a43B2C14Da09FdF82B161150d3F634f40491");

/// keccak256 of the UniswapV2Pair creation code.
pub const UNISWAP_V2_PAIR_INIT_CODE_HASH: B256 =
    b256!("96e8ac4277198ff8b6f785478aa9a39f403cb768dd02cbee326c3e7da348845f");

// Block time in seconds (post-merge slot time on both networks)
pub const BLOCK_TIME_SECS: u64 = 12;

pub fn wrapped_native_for_chain(chain_id: u64) -> Address {
    match chain_id {
        CHAIN_GOERLI => WETH_GOERLI,
        _ => WETH_MAINNET,
    }
}

// =============================================================================
// UNIVERSAL ROUTER COMMAND FORMAT
// =============================================================================

/// `V2_SWAP_EXACT_IN` command byte.
pub const UR_CMD_V2_SWAP_EXACT_IN: u8 = 0x08;
/// Low bits carry the command type; the high bit is the allow-revert flag.
pub const UR_COMMAND_TYPE_MASK: u8 = 0x3f;
/// `Constants.MSG_SENDER` recipient sentinel.
pub const UR_RECIPIENT_MSG_SENDER: u64 = 1;
/// `Constants.ADDRESS_THIS` recipient sentinel: output stays at the router.
pub const UR_RECIPIENT_ADDRESS_THIS: u64 = 2;
/// Word count of a `V2_SWAP_EXACT_IN` input whose path holds three hops.
pub const UR_THREE_HOP_INPUT_WORDS: usize = 9;

// =============================================================================
// AMM CONSTANTS
// =============================================================================

pub const V2_FEE_NUMERATOR: u64 = 997;
pub const V2_FEE_DENOMINATOR: u64 = 1_000;

/// Solver result is reduced by `result / DEFAULT_SAFETY_MARGIN_DIVISOR`.
pub const DEFAULT_SAFETY_MARGIN_DIVISOR: u64 = 300;

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const DEFAULT_BRIBE_GWEI: u64 = 20;
pub const DEFAULT_DEADLINE_SECS: u64 = 60 * 60;
/// 1 ether.
pub const DEFAULT_MAX_BUY_AMOUNT_WEI: u128 = 1_000_000_000_000_000_000;
pub const GWEI: u128 = 1_000_000_000;

// =============================================================================
// RELAY CONSTANTS
// =============================================================================

pub const FLASHBOTS_MAX_TXS: usize = 100;
pub const FLASHBOTS_MAX_BYTES: usize = 300_000;
