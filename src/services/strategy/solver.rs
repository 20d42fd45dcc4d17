// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use alloy::primitives::U256;

use crate::services::strategy::amm::{PriceModelError, ReservePair};

/// Outcome of replaying buy, victim and sell against the pool model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SandwichQuote {
    pub buy_amount: U256,
    pub attacker_tokens_out: U256,
    pub victim_tokens_out: U256,
    pub sell_amount_out: U256,
    /// `None` when the round trip returns no more than was spent.
    pub profit: Option<U256>,
}

/// Largest front-run buy that still lets the victim clear `victim_min_out`,
/// reduced by `result / margin_divisor`.
///
/// Zero means there is nothing to extract. A divisor of zero disables the margin.
pub fn optimal_front_run(
    reserves: ReservePair,
    victim_amount_in: U256,
    victim_min_out: U256,
    max_buy: U256,
    margin_divisor: u64,
) -> U256 {
    if max_buy.is_zero() || !victim_clears(reserves, U256::ZERO, victim_amount_in, victim_min_out)
    {
        return U256::ZERO;
    }

    // Invariant: `lo` is feasible, everything above `hi` is not.
    let mut lo = U256::ZERO;
    let mut hi = max_buy;
    while lo < hi {
        // Upper midpoint without overflow at a `U256::MAX` ceiling.
        let mid = hi - (hi - lo) / U256::from(2u8);
        if victim_clears(reserves, mid, victim_amount_in, victim_min_out) {
            lo = mid;
        } else {
            hi = mid - U256::from(1u8);
        }
    }

    if margin_divisor == 0 {
        return lo;
    }
    lo - lo / U256::from(margin_divisor)
}

/// Whether the victim still receives at least `min_out` after our buy of `buy`.
/// Arithmetic overflow counts as infeasible.
fn victim_clears(reserves: ReservePair, buy: U256, victim_in: U256, min_out: U256) -> bool {
    reserves
        .swap(buy)
        .and_then(|(_, after)| after.amount_out(victim_in))
        .map(|out| out >= min_out)
        .unwrap_or(false)
}

/// Round-trip the three trades in bundle order against `reserves`
/// (oriented base -> token).
pub fn quote_sandwich(
    reserves: ReservePair,
    buy_amount: U256,
    victim_amount_in: U256,
) -> Result<SandwichQuote, PriceModelError> {
    let (attacker_tokens_out, after_buy) = reserves.swap(buy_amount)?;
    let (victim_tokens_out, after_victim) = after_buy.swap(victim_amount_in)?;
    let sell_amount_out = after_victim.flipped().amount_out(attacker_tokens_out)?;
    let profit = sell_amount_out
        .checked_sub(buy_amount)
        .filter(|p| !p.is_zero());

    Ok(SandwichQuote {
        buy_amount,
        attacker_tokens_out,
        victim_tokens_out,
        sell_amount_out,
        profit,
    })
}
