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

use ahash::AHashMap;
use flashpool_math::{FeesPerLiquidity, liquidity_math::tick_spacing_to_max_liquidity_per_tick};

use crate::{
    error::LedgerError,
    pool::{tick::Tick, tick_bitmap::TickBitmap},
};

/// The initialized ticks of one pool together with their bitmap.
#[derive(Debug, Clone)]
pub struct TickMap {
    ticks: AHashMap<i32, Tick>,
    bitmap: TickBitmap,
    /// Maximum gross liquidity a single tick may reference.
    pub max_liquidity_per_tick: u128,
}

impl TickMap {
    /// Creates a new [`TickMap`] with the specified tick spacing.
    #[must_use]
    pub fn new(tick_spacing: i32) -> Self {
        Self {
            ticks: AHashMap::new(),
            bitmap: TickBitmap::new(tick_spacing),
            max_liquidity_per_tick: tick_spacing_to_max_liquidity_per_tick(tick_spacing),
        }
    }

    #[must_use]
    pub fn get(&self, tick: i32) -> Option<&Tick> {
        self.ticks.get(&tick)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Returns the fee growth inside `[lower, upper)` given the current tick and global growth.
    ///
    /// Untouched ticks count as having seen no growth outside.
    #[must_use]
    pub fn fees_inside(
        &self,
        lower: i32,
        upper: i32,
        current_tick: i32,
        global: FeesPerLiquidity,
    ) -> FeesPerLiquidity {
        let lower_outside = self.get(lower).map_or(FeesPerLiquidity::ZERO, |t| t.fees_outside);
        let upper_outside = self.get(upper).map_or(FeesPerLiquidity::ZERO, |t| t.fees_outside);

        let below = if current_tick >= lower {
            lower_outside
        } else {
            global.wrapping_sub(lower_outside)
        };
        let above = if current_tick < upper {
            upper_outside
        } else {
            global.wrapping_sub(upper_outside)
        };

        global.wrapping_sub(below).wrapping_sub(above)
    }

    /// Applies a liquidity change at a range boundary and returns whether the tick flipped
    /// between initialized and uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error if gross liquidity would go negative or exceed the per-tick maximum.
    pub fn update(
        &mut self,
        tick: i32,
        current_tick: i32,
        liquidity_delta: i128,
        upper: bool,
        global: FeesPerLiquidity,
    ) -> Result<bool, LedgerError> {
        if liquidity_delta == 0 {
            return Ok(false);
        }

        let max_liquidity_per_tick = self.max_liquidity_per_tick;
        let entry = self.ticks.entry(tick).or_default();

        let liquidity_gross_before = entry.update_liquidity(liquidity_delta, upper)?;
        if entry.liquidity_gross > max_liquidity_per_tick {
            return Err(LedgerError::Overflow("liquidity per tick"));
        }

        if liquidity_gross_before == 0 && tick <= current_tick {
            // All growth before initialization is assumed to have happened below the tick
            entry.fees_outside = global;
        }

        let flipped = (entry.liquidity_gross == 0) != (liquidity_gross_before == 0);
        if flipped {
            self.bitmap.flip_tick(tick);
        }
        Ok(flipped)
    }

    /// Crosses `tick` during a swap, returning its net liquidity.
    pub fn cross(&mut self, tick: i32, global: FeesPerLiquidity) -> i128 {
        self.ticks
            .get_mut(&tick)
            .map_or(0, |entry| entry.cross(global))
    }

    /// Removes a tick that no longer has any liquidity referencing it.
    pub fn clear(&mut self, tick: i32) {
        self.ticks.remove(&tick);
    }

    /// Finds the next initialized tick from `tick`, see [`TickBitmap::next_initialized_tick`].
    #[must_use]
    pub fn next_initialized_tick(&self, tick: i32, lte: bool, skip_ahead: u32) -> (i32, bool) {
        self.bitmap.next_initialized_tick(tick, lte, skip_ahead)
    }

    #[must_use]
    pub fn is_initialized(&self, tick: i32) -> bool {
        self.bitmap.is_initialized(tick)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
