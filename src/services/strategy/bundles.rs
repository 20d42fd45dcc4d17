// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::GWEI;
use crate::domain::error::AppError;
use crate::infrastructure::network::relay::check_bundle_limits;
use crate::services::strategy::decode::CandidateOpportunity;
use crate::services::strategy::routers::{Erc20, UniV2Router};
use crate::services::strategy::solver::SandwichQuote;
use alloy::consensus::{SignableTransaction, Transaction as ConsensusTx, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::{TransactionResponse, TxSignerSync};
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::rpc::types::eth::Transaction;
use alloy::signers::local::PrivateKeySigner;
use alloy_sol_types::SolCall;

/// Fee fields shared by the three transactions we sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSchedule {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u64,
}

impl FeeSchedule {
    /// Victim's fee caps plus a fixed bribe. A missing priority fee counts as zero.
    pub fn from_victim(victim: &Transaction, bribe_wei: u128, gas_limit: u64) -> Self {
        Self {
            max_fee_per_gas: ConsensusTx::max_fee_per_gas(victim).saturating_add(bribe_wei),
            max_priority_fee_per_gas: ConsensusTx::max_priority_fee_per_gas(victim)
                .unwrap_or(0)
                .saturating_add(bribe_wei),
            gas_limit,
        }
    }
}

/// Position of each entry in the bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleLeg {
    Buy = 0,
    Victim = 1,
    Approve = 2,
    Sell = 3,
}

impl BundleLeg {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(BundleLeg::Buy),
            1 => Some(BundleLeg::Victim),
            2 => Some(BundleLeg::Approve),
            3 => Some(BundleLeg::Sell),
            _ => None,
        }
    }
}

/// Sender and nonce of one bundle entry, used to detect stale bundles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SenderNonce {
    pub sender: Address,
    pub nonce: u64,
}

/// Buy, victim, approve, sell: signed and ready for the relay.
#[derive(Clone, Debug)]
pub struct BundlePlan {
    raw_txs: [Bytes; 4],
    tx_hashes: [B256; 4],
    senders: [SenderNonce; 4],
    pub token: Address,
    pub fees: FeeSchedule,
    pub quote: SandwichQuote,
}

impl BundlePlan {
    pub fn raw_txs(&self) -> &[Bytes] {
        &self.raw_txs
    }

    pub fn tx_hashes(&self) -> &[B256] {
        &self.tx_hashes
    }

    pub fn senders(&self) -> &[SenderNonce] {
        &self.senders
    }

    pub fn hash_of(&self, leg: BundleLeg) -> B256 {
        self.tx_hashes[leg as usize]
    }

    pub fn victim_hash(&self) -> B256 {
        self.hash_of(BundleLeg::Victim)
    }

    pub fn total_bytes(&self) -> usize {
        self.raw_txs.iter().map(|r| r.len()).sum()
    }
}

/// Signs our three legs around a victim.
#[derive(Clone)]
pub struct BundleAssembler {
    signer: PrivateKeySigner,
    chain_id: u64,
    v2_router: Address,
    wrapped_native: Address,
    bribe_wei: u128,
    gas_limit: u64,
    deadline_secs: u64,
}

impl BundleAssembler {
    pub fn new(
        signer: PrivateKeySigner,
        chain_id: u64,
        v2_router: Address,
        wrapped_native: Address,
        bribe_gwei: u64,
        gas_limit: u64,
        deadline_secs: u64,
    ) -> Self {
        Self {
            signer,
            chain_id,
            v2_router,
            wrapped_native,
            bribe_wei: u128::from(bribe_gwei).saturating_mul(GWEI),
            gas_limit,
            deadline_secs,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Assemble the four-entry bundle. `nonce` is our pending nonce; the legs take
    /// `nonce`, `nonce + 1` and `nonce + 2`.
    pub fn build(
        &self,
        candidate: &CandidateOpportunity,
        quote: &SandwichQuote,
        nonce: u64,
        now_unix: u64,
    ) -> Result<BundlePlan, AppError> {
        let token = candidate.token_to_capture;
        let me = self.signer.address();
        let deadline = U256::from(now_unix.saturating_add(self.deadline_secs));
        let fees = FeeSchedule::from_victim(&candidate.victim_tx, self.bribe_wei, self.gas_limit);

        let buy = UniV2Router::swapExactETHForTokensCall {
            amountOutMin: quote.attacker_tokens_out,
            path: vec![self.wrapped_native, token],
            to: me,
            deadline,
        }
        .abi_encode();
        let approve = Erc20::approveCall {
            spender: self.v2_router,
            amount: quote.attacker_tokens_out,
        }
        .abi_encode();
        let sell = UniV2Router::swapExactTokensForETHCall {
            amountIn: quote.attacker_tokens_out,
            amountOutMin: quote.sell_amount_out,
            path: vec![token, self.wrapped_native],
            to: me,
            deadline,
        }
        .abi_encode();

        let (buy_raw, buy_hash) =
            self.sign_leg(self.v2_router, quote.buy_amount, buy, nonce, &fees)?;
        let (approve_raw, approve_hash) =
            self.sign_leg(token, U256::ZERO, approve, nonce + 1, &fees)?;
        let (sell_raw, sell_hash) = self.sign_leg(self.v2_router, U256::ZERO, sell, nonce + 2, &fees)?;

        let victim = &candidate.victim_tx;
        let victim_raw = Bytes::from(victim.inner.encoded_2718());

        let plan = BundlePlan {
            raw_txs: [buy_raw, victim_raw, approve_raw, sell_raw],
            tx_hashes: [buy_hash, victim.tx_hash(), approve_hash, sell_hash],
            senders: [
                SenderNonce { sender: me, nonce },
                SenderNonce {
                    sender: victim.from(),
                    nonce: victim.nonce(),
                },
                SenderNonce {
                    sender: me,
                    nonce: nonce + 1,
                },
                SenderNonce {
                    sender: me,
                    nonce: nonce + 2,
                },
            ],
            token,
            fees,
            quote: *quote,
        };
        check_bundle_limits(plan.raw_txs())?;
        Ok(plan)
    }

    fn sign_leg(
        &self,
        to: Address,
        value: U256,
        input: Vec<u8>,
        nonce: u64,
        fees: &FeeSchedule,
    ) -> Result<(Bytes, B256), AppError> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit: fees.gas_limit,
            to: TxKind::Call(to),
            value,
            access_list: AccessList::default(),
            input: input.into(),
        };

        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
            .map_err(|e| AppError::Signing(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        Ok((Bytes::from(signed.encoded_2718()), *signed.tx_hash()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{CHAIN_GOERLI, UNISWAP_V2_ROUTER, WETH_GOERLI};
    use crate::services::strategy::fixtures::signed_victim_tx;
    use alloy::eips::eip2718::Decodable2718;

    const TOKEN: Address = Address::repeat_byte(0x70);

    fn decode(raw: &Bytes) -> TxEnvelope {
        let mut slice: &[u8] = raw.as_ref();
        TxEnvelope::decode_2718(&mut slice).expect("decode")
    }

    fn quote() -> SandwichQuote {
        SandwichQuote {
            buy_amount: U256::from(3_657u64),
            attacker_tokens_out: U256::from(1_816u64),
            victim_tokens_out: U256::from(4_900u64),
            sell_amount_out: U256::from(3_706u64),
            profit: Some(U256::from(49u64)),
        }
    }

    fn candidate(victim: Transaction) -> CandidateOpportunity {
        CandidateOpportunity {
            amount_in: victim.value(),
            victim_tx: victim,
            min_amount_out: U256::from(4_900u64),
            token_to_capture: TOKEN,
        }
    }

    fn assembler(signer: PrivateKeySigner) -> BundleAssembler {
        BundleAssembler::new(
            signer,
            CHAIN_GOERLI,
            UNISWAP_V2_ROUTER,
            WETH_GOERLI,
            20,
            300_000,
            3_600,
        )
    }

    #[test]
    fn plan_orders_legs_and_keeps_victim_verbatim() {
        let victim_signer = PrivateKeySigner::random();
        let victim = signed_victim_tx(&victim_signer, Address::repeat_byte(0x11), U256::from(10_000u64), vec![0xab; 8], 7);
        let ours = PrivateKeySigner::random();
        let me = ours.address();
        let plan = assembler(ours)
            .build(&candidate(victim.clone()), &quote(), 42, 1_700_000_000)
            .expect("build");

        assert_eq!(plan.raw_txs().len(), 4);
        assert_eq!(plan.raw_txs()[1].to_vec(), victim.inner.encoded_2718());
        assert_eq!(plan.victim_hash(), victim.tx_hash());

        let nonces: Vec<_> = plan.senders().iter().map(|s| (s.sender, s.nonce)).collect();
        assert_eq!(
            nonces,
            vec![(me, 42), (victim_signer.address(), 7), (me, 43), (me, 44)]
        );

        let buy = decode(&plan.raw_txs()[0]);
        assert_eq!(buy.to(), Some(UNISWAP_V2_ROUTER));
        assert_eq!(buy.value(), U256::from(3_657u64));
        assert_eq!(*buy.tx_hash(), plan.hash_of(BundleLeg::Buy));
        let call = UniV2Router::swapExactETHForTokensCall::abi_decode(buy.input()).expect("buy call");
        assert_eq!(call.amountOutMin, U256::from(1_816u64));
        assert_eq!(call.path, vec![WETH_GOERLI, TOKEN]);
        assert_eq!(call.to, me);
        assert_eq!(call.deadline, U256::from(1_700_003_600u64));

        let approve = decode(&plan.raw_txs()[2]);
        assert_eq!(approve.to(), Some(TOKEN));
        let call = Erc20::approveCall::abi_decode(approve.input()).expect("approve call");
        assert_eq!(call.spender, UNISWAP_V2_ROUTER);
        assert_eq!(call.amount, U256::from(1_816u64));

        let sell = decode(&plan.raw_txs()[3]);
        assert!(sell.value().is_zero());
        let call = UniV2Router::swapExactTokensForETHCall::abi_decode(sell.input()).expect("sell call");
        assert_eq!(call.amountIn, U256::from(1_816u64));
        assert_eq!(call.amountOutMin, U256::from(3_706u64));
        assert_eq!(call.path, vec![TOKEN, WETH_GOERLI]);
    }

    #[test]
    fn fees_add_bribe_to_victim_caps() {
        let victim = signed_victim_tx(
            &PrivateKeySigner::random(),
            Address::repeat_byte(0x11),
            U256::from(1u64),
            Vec::new(),
            0,
        );
        let fees = FeeSchedule::from_victim(&victim, 20 * GWEI, 300_000);
        assert_eq!(fees.max_fee_per_gas, 40 * GWEI + 20 * GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 2 * GWEI + 20 * GWEI);
        assert_eq!(fees.gas_limit, 300_000);
    }

    #[test]
    fn signed_legs_carry_fee_schedule() {
        let victim = signed_victim_tx(&PrivateKeySigner::random(), Address::repeat_byte(0x11), U256::from(1u64), Vec::new(), 0);
        let plan = assembler(PrivateKeySigner::random())
            .build(&candidate(victim), &quote(), 0, 0)
            .expect("build");
        for index in [0usize, 2, 3] {
            let tx = decode(&plan.raw_txs()[index]);
            assert_eq!(tx.chain_id(), Some(CHAIN_GOERLI));
            assert_eq!(tx.gas_limit(), 300_000);
            assert_eq!(tx.max_fee_per_gas(), plan.fees.max_fee_per_gas);
            assert_eq!(tx.max_priority_fee_per_gas(), Some(plan.fees.max_priority_fee_per_gas));
        }
        assert_eq!(BundleLeg::from_index(2), Some(BundleLeg::Approve));
        assert_eq!(BundleLeg::from_index(4), None);
    }
}
