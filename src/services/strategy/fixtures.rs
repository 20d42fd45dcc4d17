// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Test-only builders for router calldata and signed pending transactions.

use crate::domain::constants::{CHAIN_GOERLI, GWEI};
use crate::services::strategy::routers::UniversalRouter;
use alloy::consensus::transaction::Recovered;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::rpc::types::eth::Transaction;
use alloy::signers::local::PrivateKeySigner;
use alloy_sol_types::SolCall;

pub fn universal_router_call(commands: Vec<u8>, inputs: Vec<Bytes>) -> Vec<u8> {
    UniversalRouter::executeCall {
        commands: Bytes::from(commands),
        inputs,
    }
    .abi_encode()
}

pub fn signed_victim_tx(
    signer: &PrivateKeySigner,
    to: Address,
    value: U256,
    input: Vec<u8>,
    nonce: u64,
) -> Transaction {
    let mut tx = TxEip1559 {
        chain_id: CHAIN_GOERLI,
        nonce,
        max_priority_fee_per_gas: 2 * GWEI,
        max_fee_per_gas: 40 * GWEI,
        gas_limit: 250_000,
        to: TxKind::Call(to),
        value,
        access_list: AccessList::default(),
        input: input.into(),
    };
    let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx).expect("sign victim");
    let envelope: TxEnvelope = tx.into_signed(sig).into();
    Transaction {
        inner: Recovered::new_unchecked(envelope, signer.address()),
        block_hash: None,
        block_number: None,
        transaction_index: None,
        effective_gas_price: None,
    }
}
