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

//! The concentrated-liquidity pool engine.
//!
//! A [`Pool`] owns its price state, global fee accumulators, ticks and positions. Every
//! mutating operation returns a [`BalanceUpdate`] which the ledger feeds into the debts
//! of the active session; the pool itself never moves tokens.

use ahash::AHashMap;
use alloy_primitives::{Address, U160};
use flashpool_math::{FeesPerLiquidity, tick_math::get_sqrt_ratio_at_tick};
use serde::{Deserialize, Serialize};

use crate::{
    error::LedgerError,
    slots::{PoolId, PoolKey, PositionId, PositionKey},
};

pub mod position;
pub mod swap;
pub mod tick;
pub mod tick_bitmap;
pub mod tick_map;
pub mod update;

pub use self::{
    position::{Position, SnapshotUpdate},
    swap::{SwapOutcome, SwapParams},
    tick::Tick,
    tick_map::TickMap,
    update::PositionUpdate,
};

/// Price and active liquidity of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Square root of the token1/token0 price in Q64.96.
    pub sqrt_ratio: U160,
    /// The tick containing the current price.
    pub tick: i32,
    /// Liquidity of all positions whose range contains the current tick.
    pub liquidity: u128,
}

/// Signed token amounts owed to the ledger (positive) or by it (negative).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub delta0: i128,
    pub delta1: i128,
}

impl BalanceUpdate {
    pub const ZERO: Self = Self {
        delta0: 0,
        delta1: 0,
    };

    /// Creates a new [`BalanceUpdate`] instance.
    #[must_use]
    pub const fn new(delta0: i128, delta1: i128) -> Self {
        Self { delta0, delta1 }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.delta0 == 0 && self.delta1 == 0
    }
}

/// State of a single initialized pool.
#[derive(Debug, Clone)]
pub struct Pool {
    id: PoolId,
    key: PoolKey,
    state: PoolState,
    fees_per_liquidity: FeesPerLiquidity,
    ticks: TickMap,
    positions: AHashMap<PositionId, Position>,
}

impl Pool {
    /// Creates a new [`Pool`] priced at `tick`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tick` is outside the tick bounds.
    pub fn new(key: PoolKey, tick: i32) -> Result<Self, LedgerError> {
        let sqrt_ratio = get_sqrt_ratio_at_tick(tick)?;
        Ok(Self {
            id: key.pool_id(),
            key,
            state: PoolState {
                sqrt_ratio,
                tick,
                liquidity: 0,
            },
            fees_per_liquidity: FeesPerLiquidity::ZERO,
            ticks: TickMap::new(key.spacing()),
            positions: AHashMap::new(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> PoolId {
        self.id
    }

    #[must_use]
    pub const fn key(&self) -> &PoolKey {
        &self.key
    }

    #[must_use]
    pub const fn state(&self) -> PoolState {
        self.state
    }

    /// Returns the global fee-per-liquidity accumulators.
    #[must_use]
    pub const fn fees_per_liquidity(&self) -> FeesPerLiquidity {
        self.fees_per_liquidity
    }

    #[must_use]
    pub fn tick(&self, tick: i32) -> Option<&Tick> {
        self.ticks.get(tick)
    }

    #[must_use]
    pub const fn ticks(&self) -> &TickMap {
        &self.ticks
    }

    /// Returns the position `key` owned by `owner`, if it holds any liquidity.
    #[must_use]
    pub fn position(&self, owner: Address, key: &PositionKey) -> Option<&Position> {
        self.positions.get(&key.position_id(owner))
    }

    #[must_use]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the fees per liquidity accrued inside `[lower, upper)` at the current price.
    #[must_use]
    pub fn fees_per_liquidity_inside(&self, lower: i32, upper: i32) -> FeesPerLiquidity {
        self.ticks
            .fees_inside(lower, upper, self.state.tick, self.fees_per_liquidity)
    }

    /// Distributes `amount0` and `amount1` to the liquidity currently in range.
    ///
    /// Without active liquidity the amounts are kept by the pool and no accumulator moves.
    ///
    /// # Errors
    ///
    /// Returns an error if the per-liquidity increment cannot be represented.
    pub fn accumulate_as_fees(&mut self, amount0: u128, amount1: u128) -> Result<(), LedgerError> {
        if self.state.liquidity == 0 {
            return Ok(());
        }
        self.fees_per_liquidity =
            self.fees_per_liquidity
                .accumulate_amounts(amount0, amount1, self.state.liquidity)?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
