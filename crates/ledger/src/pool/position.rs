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

/// A concentrated liquidity position in a pool.
///
/// Fees owed to the position are never stored directly: they are always the growth of the
/// fees inside its range since `fees_per_liquidity_inside_last`, times its liquidity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The amount of liquidity in the position.
    pub liquidity: u128,
    /// Fees per liquidity inside the range as of the last snapshot.
    pub fees_per_liquidity_inside_last: FeesPerLiquidity,
}

/// How a position's fee snapshot was moved when its liquidity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotUpdate {
    /// Accrued fees were re-expressed against the new liquidity and remain owed.
    Rebased,
    /// The position was emptied; accrued fees are paid out and the snapshot cleared.
    Cleared { fees0: u128, fees1: u128 },
    /// Re-expressing accrued fees would have wrapped the snapshot; they are paid out
    /// and the snapshot advanced to the current inside value.
    Realized { fees0: u128, fees1: u128 },
}

impl SnapshotUpdate {
    /// Returns the fees the caller must be credited with.
    #[must_use]
    pub const fn realized(&self) -> (u128, u128) {
        match self {
            Self::Rebased => (0, 0),
            Self::Cleared { fees0, fees1 } | Self::Realized { fees0, fees1 } => (*fees0, *fees1),
        }
    }
}

impl Position {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.liquidity == 0
    }

    /// Returns the fees accrued since the last snapshot given the current `inside` value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if either amount exceeds 128 bits.
    pub fn fees(&self, inside: FeesPerLiquidity) -> Result<(u128, u128), LedgerError> {
        Ok(inside.fees_since(self.fees_per_liquidity_inside_last, self.liquidity)?)
    }

    /// Sets the position's liquidity to `liquidity`, moving the snapshot so that fees accrued
    /// so far stay owed.
    ///
    /// The new snapshot is `inside - fees / liquidity` computed with a checked subtraction;
    /// when that would wrap, the fees are realized instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the accrued fees exceed 128 bits.
    pub fn set_liquidity(
        &mut self,
        inside: FeesPerLiquidity,
        liquidity: u128,
    ) -> Result<SnapshotUpdate, LedgerError> {
        let (fees0, fees1) = self.fees(inside)?;
        self.liquidity = liquidity;

        if liquidity == 0 {
            self.fees_per_liquidity_inside_last = FeesPerLiquidity::ZERO;
            return Ok(SnapshotUpdate::Cleared { fees0, fees1 });
        }

        match inside.checked_rewind(fees0, fees1, liquidity)? {
            Some(snapshot) => {
                self.fees_per_liquidity_inside_last = snapshot;
                Ok(SnapshotUpdate::Rebased)
            }
            None => {
                self.fees_per_liquidity_inside_last = inside;
                Ok(SnapshotUpdate::Realized { fees0, fees1 })
            }
        }
    }

    /// Advances the snapshot to `inside` and returns the fees accrued until now.
    ///
    /// # Errors
    ///
    /// Returns an error if the accrued fees exceed 128 bits.
    pub fn collect(&mut self, inside: FeesPerLiquidity) -> Result<(u128, u128), LedgerError> {
        let fees = self.fees(inside)?;
        self.fees_per_liquidity_inside_last = inside;
        Ok(fees)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
