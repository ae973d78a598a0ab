// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

use alloy_primitives::{U160, U256};
use flashpool_math::{
    CheckedBoundedAmount, FullMath, Q128,
    liquidity_math::add_delta,
    swap_math::compute_swap_step,
    tick_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO, get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio},
};

use crate::{
    error::LedgerError,
    pool::{BalanceUpdate, Pool, PoolState},
};

/// Parameters of a swap against a single pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    /// Exact input when positive, exact output when negative.
    pub amount: i128,
    /// Whether `amount` is denominated in token1.
    pub is_token1: bool,
    /// The price beyond which the swap stops.
    pub sqrt_ratio_limit: U160,
    /// Number of empty bitmap words the tick search may cross per step.
    pub skip_ahead: u32,
}

impl SwapParams {
    /// Creates a new [`SwapParams`] instance.
    #[must_use]
    pub const fn new(
        amount: i128,
        is_token1: bool,
        sqrt_ratio_limit: U160,
        skip_ahead: u32,
    ) -> Self {
        Self {
            amount,
            is_token1,
            sqrt_ratio_limit,
            skip_ahead,
        }
    }

    /// Returns whether the swap sells token0 for token1, moving the price down.
    #[must_use]
    pub const fn zero_for_one(&self) -> bool {
        (self.amount < 0) == self.is_token1
    }
}

/// Result of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub balance_update: BalanceUpdate,
    pub state_after: PoolState,
    pub ticks_crossed: u32,
    pub steps: u32,
}

fn to_amount(value: U256) -> Result<i128, LedgerError> {
    CheckedBoundedAmount::from_u256(value)
        .map(|amount| amount.value())
        .ok_or(LedgerError::Overflow("swap amount"))
}

impl Pool {
    /// Swaps against the pool, walking initialized ticks until the specified amount is used
    /// up or the price limit is reached.
    ///
    /// Fee growth for the input token is tracked in a running value that is updated once per
    /// step; ticks crossed take the running value as of their crossing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPriceLimit`] if the limit is not strictly on the side of
    /// the current price the swap moves towards, or an overflow error if any amount leaves
    /// its bound.
    pub fn swap(&mut self, params: &SwapParams) -> Result<SwapOutcome, LedgerError> {
        let zero_for_one = params.zero_for_one();
        let limit = params.sqrt_ratio_limit;
        let current = self.state.sqrt_ratio;

        let valid_limit = if zero_for_one {
            limit < current && limit > MIN_SQRT_RATIO
        } else {
            limit > current && limit < MAX_SQRT_RATIO
        };
        if !valid_limit {
            return Err(LedgerError::InvalidPriceLimit { limit, current });
        }

        if params.amount == 0 {
            return Ok(SwapOutcome {
                balance_update: BalanceUpdate::ZERO,
                state_after: self.state,
                ticks_crossed: 0,
                steps: 0,
            });
        }

        let exact_input = params.amount > 0;
        let fee = self.key.fee;
        let mut sqrt_ratio = self.state.sqrt_ratio;
        let mut tick = self.state.tick;
        let mut liquidity = self.state.liquidity;
        let mut amount_remaining = params.amount;
        let mut amount_calculated: i128 = 0;
        let mut ticks_crossed = 0u32;
        let mut steps = 0u32;

        // Running fee growth of the input token
        let mut fee_growth = if zero_for_one {
            self.fees_per_liquidity.value0
        } else {
            self.fees_per_liquidity.value1
        };

        while amount_remaining != 0 && sqrt_ratio != limit {
            steps += 1;
            let sqrt_ratio_start = sqrt_ratio;

            let (tick_next, initialized) =
                self.ticks
                    .next_initialized_tick(tick, zero_for_one, params.skip_ahead);
            let sqrt_ratio_next = get_sqrt_ratio_at_tick(tick_next)?;

            let target = if (zero_for_one && sqrt_ratio_next < limit)
                || (!zero_for_one && sqrt_ratio_next > limit)
            {
                limit
            } else {
                sqrt_ratio_next
            };

            let step = compute_swap_step(sqrt_ratio, target, liquidity, amount_remaining, fee)?;
            sqrt_ratio = step.sqrt_ratio_next_x96;

            let consumed = to_amount(step.amount_in + step.fee_amount)?;
            let produced = to_amount(step.amount_out)?;
            if exact_input {
                amount_remaining = amount_remaining
                    .checked_sub(consumed)
                    .ok_or(LedgerError::Overflow("swap amount"))?;
                amount_calculated = amount_calculated
                    .checked_sub(produced)
                    .ok_or(LedgerError::Overflow("swap amount"))?;
            } else {
                amount_remaining = amount_remaining
                    .checked_add(produced)
                    .ok_or(LedgerError::Overflow("swap amount"))?;
                amount_calculated = amount_calculated
                    .checked_add(consumed)
                    .ok_or(LedgerError::Overflow("swap amount"))?;
            }

            if liquidity > 0 {
                let growth = FullMath::mul_div(step.fee_amount, Q128, U256::from(liquidity))?;
                fee_growth = fee_growth.accumulate(growth);
            }

            if sqrt_ratio == sqrt_ratio_next {
                if initialized {
                    let mut global = self.fees_per_liquidity;
                    if zero_for_one {
                        global.value0 = fee_growth;
                    } else {
                        global.value1 = fee_growth;
                    }
                    let liquidity_net = self.ticks.cross(tick_next, global);
                    let delta = if zero_for_one {
                        liquidity_net
                            .checked_neg()
                            .ok_or(LedgerError::Overflow("tick liquidity net"))?
                    } else {
                        liquidity_net
                    };
                    liquidity = add_delta(liquidity, delta)?;
                    ticks_crossed += 1;
                }
                tick = if zero_for_one { tick_next - 1 } else { tick_next };
            } else if sqrt_ratio != sqrt_ratio_start {
                tick = get_tick_at_sqrt_ratio(sqrt_ratio)?;
            }
        }

        self.state = PoolState {
            sqrt_ratio,
            tick,
            liquidity,
        };
        if zero_for_one {
            self.fees_per_liquidity.value0 = fee_growth;
        } else {
            self.fees_per_liquidity.value1 = fee_growth;
        }

        let specified_used = params.amount - amount_remaining;
        let (delta0, delta1) = if zero_for_one == exact_input {
            (specified_used, amount_calculated)
        } else {
            (amount_calculated, specified_used)
        };

        Ok(SwapOutcome {
            balance_update: BalanceUpdate::new(delta0, delta1),
            state_after: self.state,
            ticks_crossed,
            steps,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use flashpool_math::{
        sqrt_price_math::expand_to_18_decimals,
        tick_math::{MAX_SQRT_RATIO, MIN_SQRT_RATIO},
    };
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        slots::{PoolKey, PositionKey},
        stubs::pool_key,
    };

    const OWNER: Address = Address::with_last_byte(0xa1);

    fn below_min() -> U160 {
        MIN_SQRT_RATIO + U160::from(1u8)
    }

    fn below_max() -> U160 {
        MAX_SQRT_RATIO - U160::from(1u8)
    }

    #[fixture]
    fn pool() -> Pool {
        let key = PoolKey {
            fee: 3_000,
            tick_spacing: 60,
            ..pool_key()
        };
        let mut pool = Pool::new(key, 0).unwrap();
        pool.update_position(
            OWNER,
            &PositionKey::new(B256::ZERO, -887_220, 887_220),
            expand_to_18_decimals(2) as i128,
            0,
        )
        .unwrap();
        pool
    }

    #[rstest]
    #[case(1_000, false, true)]
    #[case(-1_000, true, true)]
    #[case(1_000, true, false)]
    #[case(-1_000, false, false)]
    fn test_direction(#[case] amount: i128, #[case] is_token1: bool, #[case] zero_for_one: bool) {
        let params = SwapParams::new(amount, is_token1, U160::ZERO, 0);
        assert_eq!(params.zero_for_one(), zero_for_one);
    }

    #[rstest]
    fn test_invalid_price_limits(mut pool: Pool) {
        let current = pool.state().sqrt_ratio;
        for (params, name) in [
            (SwapParams::new(100, false, current, 0), "at current"),
            (SwapParams::new(100, false, current + U160::from(1u8), 0), "wrong side"),
            (SwapParams::new(100, false, MIN_SQRT_RATIO, 0), "at min"),
            (SwapParams::new(100, true, MAX_SQRT_RATIO, 0), "at max"),
        ] {
            assert!(
                matches!(pool.swap(&params), Err(LedgerError::InvalidPriceLimit { .. })),
                "{name}"
            );
        }
    }

    #[rstest]
    fn test_zero_amount_is_noop(mut pool: Pool) {
        let before = pool.state();
        let outcome = pool.swap(&SwapParams::new(0, false, below_min(), 0)).unwrap();
        assert!(outcome.balance_update.is_zero());
        assert_eq!(pool.state(), before);
    }

    #[rstest]
    fn test_exact_input_token0(mut pool: Pool) {
        let outcome = pool
            .swap(&SwapParams::new(1_000, false, below_min(), 0))
            .unwrap();

        assert_eq!(outcome.balance_update, BalanceUpdate::new(1_000, -996));
        assert_eq!(pool.state().tick, -1);
        assert_eq!(pool.state().liquidity, expand_to_18_decimals(2));
        // 3 units of fee, spread over 2e18 liquidity
        assert!(pool.fees_per_liquidity().value0.value() > U256::ZERO);
        assert_eq!(pool.fees_per_liquidity().value1.value(), U256::ZERO);
    }

    #[rstest]
    fn test_exact_output_token0(mut pool: Pool) {
        let outcome = pool
            .swap(&SwapParams::new(-1_000, false, below_max(), 0))
            .unwrap();

        assert_eq!(outcome.balance_update, BalanceUpdate::new(-1_000, 1_005));
        assert_eq!(pool.state().tick, 0);
        assert!(pool.fees_per_liquidity().value1.value() > U256::ZERO);
    }

    #[rstest]
    fn test_stops_at_price_limit(mut pool: Pool) {
        let limit = get_sqrt_ratio_at_tick(-10).unwrap();
        let outcome = pool
            .swap(&SwapParams::new(i128::from(u64::MAX), false, limit, 0))
            .unwrap();

        assert_eq!(pool.state().sqrt_ratio, limit);
        assert_eq!(pool.state().tick, -10);
        assert!(outcome.balance_update.delta0 < i128::from(u64::MAX));
        assert!(outcome.balance_update.delta1 < 0);
    }

    #[rstest]
    fn test_crossing_range_boundary_changes_liquidity(mut pool: Pool) {
        let range = PositionKey::new(B256::ZERO, -120, 120);
        pool.update_position(OWNER, &range, 1_000_000, 0).unwrap();
        let liquidity_in_range = pool.state().liquidity;

        let limit = get_sqrt_ratio_at_tick(-180).unwrap();
        let outcome = pool
            .swap(&SwapParams::new(i128::from(u64::MAX), false, limit, 0))
            .unwrap();

        assert_eq!(outcome.ticks_crossed, 1);
        assert_eq!(pool.state().liquidity, liquidity_in_range - 1_000_000);
        assert_eq!(pool.state().tick, -180);
    }

    #[rstest]
    fn test_swap_back_restores_liquidity(mut pool: Pool) {
        let range = PositionKey::new(B256::ZERO, -120, 120);
        pool.update_position(OWNER, &range, 1_000_000, 0).unwrap();
        let before = pool.state().liquidity;

        pool.swap(&SwapParams::new(
            i128::from(u64::MAX),
            false,
            get_sqrt_ratio_at_tick(-180).unwrap(),
            0,
        ))
        .unwrap();
        pool.swap(&SwapParams::new(
            i128::from(u64::MAX),
            true,
            get_sqrt_ratio_at_tick(0).unwrap(),
            0,
        ))
        .unwrap();

        assert_eq!(pool.state().tick, 0);
        assert_eq!(pool.state().liquidity, before);
    }

    #[rstest]
    fn test_swap_from_initialized_tick_crosses_without_moving() {
        let key = PoolKey {
            tick_spacing: 10,
            ..pool_key()
        };
        let mut pool = Pool::new(key, 0).unwrap();
        pool.update_position(OWNER, &PositionKey::new(B256::ZERO, 0, 100), 1_000, 0)
            .unwrap();
        assert_eq!(pool.state().liquidity, 1_000);

        let outcome = pool
            .swap(&SwapParams::new(1, false, below_min(), 0))
            .unwrap();

        // The boundary at the current price is crossed first, leaving no liquidity
        assert_eq!(outcome.ticks_crossed, 1);
        assert_eq!(pool.state().liquidity, 0);
        assert_eq!(pool.state().sqrt_ratio, below_min());
        assert_eq!(outcome.balance_update, BalanceUpdate::new(0, 0));
    }
}
