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

use flashpool_math::FeesPerLiquidity;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Liquidity and fee bookkeeping at one initialized tick of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Total liquidity of all positions using this tick as a boundary.
    pub liquidity_gross: u128,
    /// Net liquidity added to the active range when the price crosses this tick upwards.
    pub liquidity_net: i128,
    /// Fee growth on the other side of this tick relative to the current price.
    pub fees_outside: FeesPerLiquidity,
}

impl Tick {
    /// Returns whether any position references this tick.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.liquidity_gross > 0
    }

    /// Applies a position's liquidity change, returning the gross liquidity before it.
    ///
    /// # Errors
    ///
    /// Returns an error if gross liquidity would go negative or either value overflows.
    pub fn update_liquidity(
        &mut self,
        liquidity_delta: i128,
        upper: bool,
    ) -> Result<u128, LedgerError> {
        let liquidity_gross_before = self.liquidity_gross;
        self.liquidity_gross =
            flashpool_math::liquidity_math::add_delta(self.liquidity_gross, liquidity_delta)?;

        // Crossing an upper boundary upwards leaves the range
        let net = if upper {
            self.liquidity_net.checked_sub(liquidity_delta)
        } else {
            self.liquidity_net.checked_add(liquidity_delta)
        };
        self.liquidity_net = net.ok_or(LedgerError::Overflow("tick liquidity net"))?;

        Ok(liquidity_gross_before)
    }

    /// Flips the outside fee growth against `global` and returns the net liquidity to apply.
    pub fn cross(&mut self, global: FeesPerLiquidity) -> i128 {
        self.fees_outside = global.wrapping_sub(self.fees_outside);
        self.liquidity_net
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
