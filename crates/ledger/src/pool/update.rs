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

use alloy_primitives::{Address, U256};
use flashpool_math::{
    CheckedBoundedAmount, FullMath, liquidity_math::add_delta,
    sqrt_price_math::get_amounts_for_liquidity, swap_math::FEE_DENOMINATOR,
};

use crate::{
    error::LedgerError,
    pool::{BalanceUpdate, Pool, position::SnapshotUpdate},
    slots::PositionKey,
};

/// Result of changing a position's liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    /// Amounts owed by the session (deposits) or to it (withdrawals and realized fees).
    pub balance_update: BalanceUpdate,
    /// How the position's fee snapshot moved.
    pub snapshot: SnapshotUpdate,
    /// Withdrawal fees retained by the protocol.
    pub protocol_fees: (u128, u128),
}

fn to_amount(value: u128) -> Result<i128, LedgerError> {
    CheckedBoundedAmount::from_unsigned(value)
        .map(|amount| amount.value())
        .ok_or(LedgerError::Overflow("position amount"))
}

fn withdrawal_fee(amount: u128, fee_pips: u32) -> Result<u128, LedgerError> {
    let fee = FullMath::mul_div_rounding_up(
        U256::from(amount),
        U256::from(fee_pips),
        U256::from(FEE_DENOMINATOR),
    )?;
    Ok(FullMath::to_u128(fee, "withdrawal fee")?)
}

impl Pool {
    /// Adds `liquidity_delta` to the position `key` of `owner`.
    ///
    /// Deposits round amounts up and withdrawals round them down. On withdrawal the protocol
    /// keeps `ceil(amount * withdrawal_fee_pips / 1e6)` of each token.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRange`] for a range the pool cannot hold, an underflow
    /// error if the position's liquidity would go negative, and an overflow error if any
    /// amount leaves its 128-bit bound.
    pub fn update_position(
        &mut self,
        owner: Address,
        key: &PositionKey,
        liquidity_delta: i128,
        withdrawal_fee_pips: u32,
    ) -> Result<PositionUpdate, LedgerError> {
        key.validate(self.key.spacing())?;

        let position_id = key.position_id(owner);
        let mut position = self.positions.get(&position_id).copied().unwrap_or_default();
        let liquidity_next = add_delta(position.liquidity, liquidity_delta)?;

        let current_tick = self.state.tick;
        let global = self.fees_per_liquidity;
        let flipped_lower = self
            .ticks
            .update(key.lower, current_tick, liquidity_delta, false, global)?;
        let flipped_upper = self
            .ticks
            .update(key.upper, current_tick, liquidity_delta, true, global)?;

        let inside = self.fees_per_liquidity_inside(key.lower, key.upper);
        let snapshot = position.set_liquidity(inside, liquidity_next)?;

        let mut delta0 = 0i128;
        let mut delta1 = 0i128;
        let mut protocol_fees = (0u128, 0u128);
        if liquidity_delta != 0 {
            let (amount0, amount1) = get_amounts_for_liquidity(
                self.state.sqrt_ratio,
                key.lower,
                key.upper,
                liquidity_delta.unsigned_abs(),
                liquidity_delta > 0,
            )?;
            let amount0 = FullMath::to_u128(amount0, "position amount")?;
            let amount1 = FullMath::to_u128(amount1, "position amount")?;

            if liquidity_delta > 0 {
                delta0 = to_amount(amount0)?;
                delta1 = to_amount(amount1)?;
            } else {
                protocol_fees = (
                    withdrawal_fee(amount0, withdrawal_fee_pips)?,
                    withdrawal_fee(amount1, withdrawal_fee_pips)?,
                );
                delta0 = -to_amount(amount0 - protocol_fees.0)?;
                delta1 = -to_amount(amount1 - protocol_fees.1)?;
            }
        }

        let (fees0, fees1) = snapshot.realized();
        delta0 = delta0
            .checked_sub(to_amount(fees0)?)
            .ok_or(LedgerError::Overflow("position amount"))?;
        delta1 = delta1
            .checked_sub(to_amount(fees1)?)
            .ok_or(LedgerError::Overflow("position amount"))?;

        if key.lower <= current_tick && current_tick < key.upper {
            self.state.liquidity = add_delta(self.state.liquidity, liquidity_delta)?;
        }

        if liquidity_delta < 0 {
            if flipped_lower {
                self.ticks.clear(key.lower);
            }
            if flipped_upper {
                self.ticks.clear(key.upper);
            }
        }

        if position.is_empty() {
            self.positions.remove(&position_id);
        } else {
            self.positions.insert(position_id, position);
        }

        Ok(PositionUpdate {
            balance_update: BalanceUpdate::new(delta0, delta1),
            snapshot,
            protocol_fees,
        })
    }

    /// Collects the fees accrued by position `key` of `owner` since its last snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid or the fees exceed 128 bits.
    pub fn collect_fees(
        &mut self,
        owner: Address,
        key: &PositionKey,
    ) -> Result<(u128, u128), LedgerError> {
        key.validate(self.key.spacing())?;

        let inside = self.fees_per_liquidity_inside(key.lower, key.upper);
        match self.positions.get_mut(&key.position_id(owner)) {
            Some(position) => position.collect(inside),
            None => Ok((0, 0)),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use flashpool_math::{FeesPerLiquidity, tick_math::get_sqrt_ratio_at_tick};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{pool::SwapParams, slots::PoolKey, stubs::pool_key};

    const OWNER: Address = Address::with_last_byte(0xa1);

    fn range(lower: i32, upper: i32) -> PositionKey {
        PositionKey::new(B256::ZERO, lower, upper)
    }

    #[fixture]
    fn pool() -> Pool {
        Pool::new(
            PoolKey {
                fee: 3_000,
                tick_spacing: 10,
                ..pool_key()
            },
            0,
        )
        .unwrap()
    }

    #[rstest]
    fn test_deposit_in_range_rounds_up(mut pool: Pool) {
        let update = pool.update_position(OWNER, &range(-100, 100), 1_000_000, 0).unwrap();

        assert_eq!(update.balance_update, BalanceUpdate::new(4_988, 4_988));
        assert_eq!(pool.state().liquidity, 1_000_000);
        assert_eq!(pool.position(OWNER, &range(-100, 100)).unwrap().liquidity, 1_000_000);
        assert!(pool.ticks().is_initialized(-100));
        assert!(pool.ticks().is_initialized(100));
    }

    #[rstest]
    fn test_deposit_out_of_range_uses_single_token(mut pool: Pool) {
        let above = pool.update_position(OWNER, &range(100, 200), 1_000_000, 0).unwrap();
        let below = pool.update_position(OWNER, &range(-200, -100), 1_000_000, 0).unwrap();

        assert!(above.balance_update.delta0 > 0);
        assert_eq!(above.balance_update.delta1, 0);
        assert_eq!(below.balance_update.delta0, 0);
        assert!(below.balance_update.delta1 > 0);
        assert_eq!(pool.state().liquidity, 0);
    }

    #[rstest]
    fn test_round_trip_never_returns_more(mut pool: Pool) {
        let deposit = pool.update_position(OWNER, &range(-100, 100), 1_000_000, 0).unwrap();
        let withdrawal = pool.update_position(OWNER, &range(-100, 100), -1_000_000, 0).unwrap();

        assert_eq!(withdrawal.balance_update, BalanceUpdate::new(-4_987, -4_987));
        assert!(-withdrawal.balance_update.delta0 <= deposit.balance_update.delta0);
        assert!(-withdrawal.balance_update.delta1 <= deposit.balance_update.delta1);
        assert_eq!(pool.position_count(), 0);
        assert!(pool.ticks().is_empty());
        assert_eq!(pool.state().liquidity, 0);
    }

    #[rstest]
    fn test_withdrawal_fee_is_retained(mut pool: Pool) {
        pool.update_position(OWNER, &range(-100, 100), 1_000_000, 0).unwrap();
        let withdrawal = pool
            .update_position(OWNER, &range(-100, 100), -1_000_000, 1_000)
            .unwrap();

        // ceil(4987 * 0.001) = 5
        assert_eq!(withdrawal.protocol_fees, (5, 5));
        assert_eq!(withdrawal.balance_update, BalanceUpdate::new(-4_982, -4_982));
    }

    #[rstest]
    fn test_rejects_negative_liquidity(mut pool: Pool) {
        pool.update_position(OWNER, &range(-100, 100), 10, 0).unwrap();
        assert_eq!(
            pool.update_position(OWNER, &range(-100, 100), -11, 0),
            Err(LedgerError::Underflow("liquidity"))
        );
    }

    #[rstest]
    #[case(range(100, -100))]
    #[case(range(-105, 100))]
    #[case(range(-887_280, 0))]
    fn test_rejects_invalid_range(mut pool: Pool, #[case] key: PositionKey) {
        assert!(matches!(
            pool.update_position(OWNER, &key, 1, 0),
            Err(LedgerError::InvalidRange(_))
        ));
    }

    #[rstest]
    fn test_positions_are_owned(mut pool: Pool) {
        pool.update_position(OWNER, &range(-100, 100), 10, 0).unwrap();
        let stranger = Address::with_last_byte(0xbb);

        assert!(pool.position(stranger, &range(-100, 100)).is_none());
        assert_eq!(
            pool.update_position(stranger, &range(-100, 100), -1, 0),
            Err(LedgerError::Underflow("liquidity"))
        );
    }

    #[rstest]
    fn test_collect_fees_after_swap(mut pool: Pool) {
        pool.update_position(OWNER, &range(-100, 100), 1_000_000, 0).unwrap();
        pool.swap(&SwapParams::new(
            1_000,
            false,
            get_sqrt_ratio_at_tick(-100).unwrap(),
            0,
        ))
        .unwrap();

        let (fees0, fees1) = pool.collect_fees(OWNER, &range(-100, 100)).unwrap();
        assert_eq!((fees0, fees1), (2, 0));
        assert_eq!(pool.collect_fees(OWNER, &range(-100, 100)).unwrap(), (0, 0));
    }

    #[rstest]
    fn test_collect_fees_unknown_position(mut pool: Pool) {
        assert_eq!(pool.collect_fees(OWNER, &range(-100, 100)).unwrap(), (0, 0));
    }

    #[rstest]
    fn test_drastic_reduction_realizes_fees(mut pool: Pool) {
        pool.update_position(OWNER, &range(-100, 100), 1_000_000, 0).unwrap();
        pool.accumulate_as_fees(5_000, 3_000).unwrap();

        let update = pool.update_position(OWNER, &range(-100, 100), -999_999, 0).unwrap();

        assert_eq!(
            update.snapshot,
            SnapshotUpdate::Realized {
                fees0: 4_999,
                fees1: 2_999
            }
        );
        let position = *pool.position(OWNER, &range(-100, 100)).unwrap();
        assert_eq!(position.liquidity, 1);
        let inside = pool.fees_per_liquidity_inside(-100, 100);
        assert_eq!(position.fees_per_liquidity_inside_last, inside);
        assert_ne!(inside, FeesPerLiquidity::ZERO);
        assert_eq!(position.fees(inside).unwrap(), (0, 0));
    }
}
