// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::domain::constants::{V2_FEE_DENOMINATOR, V2_FEE_NUMERATOR};

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PriceModelError {
    #[error("arithmetic overflow in constant-product formula")]
    Overflow,
    #[error("pool has no liquidity on one side")]
    InsufficientLiquidity,
}

/// Reserves of one V2 pair, oriented for a trade from `reserve_in` to `reserve_out`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservePair {
    pub reserve_in: U256,
    pub reserve_out: U256,
}

impl ReservePair {
    pub fn new(reserve_in: U256, reserve_out: U256) -> Self {
        Self {
            reserve_in,
            reserve_out,
        }
    }

    /// Orient raw `getReserves()` output for a `base -> token` trade.
    ///
    /// The pair stores `reserve0` for the numerically smaller token address.
    pub fn oriented(base: Address, token: Address, reserve0: U256, reserve1: U256) -> Self {
        if base < token {
            Self::new(reserve0, reserve1)
        } else {
            Self::new(reserve1, reserve0)
        }
    }

    /// The same pool viewed from the other side.
    pub fn flipped(self) -> Self {
        Self::new(self.reserve_out, self.reserve_in)
    }

    pub fn amount_out(&self, amount_in: U256) -> Result<U256, PriceModelError> {
        get_amount_out(amount_in, self.reserve_in, self.reserve_out)
    }

    /// Quote a trade and return the pool state after it settles.
    pub fn swap(self, amount_in: U256) -> Result<(U256, ReservePair), PriceModelError> {
        let out = self.amount_out(amount_in)?;
        Ok((out, apply_swap(self, amount_in, out)?))
    }
}

/// Uniswap V2 `getAmountOut` with the 0.3% fee, truncating division.
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, PriceModelError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(PriceModelError::InsufficientLiquidity);
    }
    if amount_in.is_zero() {
        return Ok(U256::ZERO);
    }
    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(V2_FEE_NUMERATOR))
        .ok_or(PriceModelError::Overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(PriceModelError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(U256::from(V2_FEE_DENOMINATOR))
        .and_then(|r| r.checked_add(amount_in_with_fee))
        .ok_or(PriceModelError::Overflow)?;
    Ok(numerator / denominator)
}

/// Post-trade reserves: the input side grows by the full input, the output side
/// shrinks by what left the pool.
pub fn apply_swap(
    reserves: ReservePair,
    amount_in: U256,
    amount_out: U256,
) -> Result<ReservePair, PriceModelError> {
    let reserve_in = reserves
        .reserve_in
        .checked_add(amount_in)
        .ok_or(PriceModelError::Overflow)?;
    let reserve_out = reserves
        .reserve_out
        .checked_sub(amount_out)
        .ok_or(PriceModelError::InsufficientLiquidity)?;
    Ok(ReservePair::new(reserve_in, reserve_out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    #[test]
    fn matches_router_formula() {
        // 10_000 * 997 * 500_000 / (1_000_000 * 1000 + 10_000 * 997)
        assert_eq!(
            get_amount_out(u(10_000), u(1_000_000), u(500_000)),
            Ok(u(4_935))
        );
    }

    #[test]
    fn zero_input_and_empty_pools() {
        assert_eq!(get_amount_out(U256::ZERO, u(1), u(1)), Ok(U256::ZERO));
        assert_eq!(
            get_amount_out(u(1), U256::ZERO, u(1)),
            Err(PriceModelError::InsufficientLiquidity)
        );
        assert_eq!(
            get_amount_out(u(1), u(1), U256::ZERO),
            Err(PriceModelError::InsufficientLiquidity)
        );
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            get_amount_out(U256::MAX, u(1), u(1)),
            Err(PriceModelError::Overflow)
        );
        assert_eq!(
            get_amount_out(u(2), U256::MAX, U256::MAX),
            Err(PriceModelError::Overflow)
        );
    }

    #[test]
    fn orientation_follows_numeric_address_order() {
        let low = Address::repeat_byte(0x01);
        let high = Address::repeat_byte(0xfe);
        assert_eq!(
            ReservePair::oriented(low, high, u(10), u(20)),
            ReservePair::new(u(10), u(20))
        );
        assert_eq!(
            ReservePair::oriented(high, low, u(10), u(20)),
            ReservePair::new(u(20), u(10))
        );
    }

    #[test]
    fn swap_moves_reserves() {
        let pool = ReservePair::new(u(1_000_000), u(500_000));
        let (out, after) = pool.swap(u(10_000)).expect("swap");
        assert_eq!(out, u(4_935));
        assert_eq!(after, ReservePair::new(u(1_010_000), u(495_065)));
        assert_eq!(after.flipped(), ReservePair::new(u(495_065), u(1_010_000)));
    }

    proptest! {
        #[test]
        fn output_is_below_reserve_out(
            amount in 0u128..=u128::from(u64::MAX),
            r_in in 1u128..=u128::from(u64::MAX),
            r_out in 1u128..=u128::from(u64::MAX),
        ) {
            let out = get_amount_out(u(amount), u(r_in), u(r_out)).expect("no overflow at 64 bits");
            prop_assert!(out < u(r_out));
        }

        #[test]
        fn output_is_monotone_in_input(
            a in 0u64..=u64::MAX,
            b in 0u64..=u64::MAX,
            r_in in 1u64..=u64::MAX,
            r_out in 1u64..=u64::MAX,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let out_lo = get_amount_out(U256::from(lo), U256::from(r_in), U256::from(r_out)).expect("quote");
            let out_hi = get_amount_out(U256::from(hi), U256::from(r_in), U256::from(r_out)).expect("quote");
            prop_assert!(out_lo <= out_hi);
        }
    }
}
