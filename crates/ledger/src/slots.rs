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

//! Deterministic identifiers for per-pool, per-position and per-owner state.
//!
//! Every identifier is the Keccak-256 hash of 32-byte ABI words, so the same key
//! always addresses the same slot regardless of insertion order.

use std::fmt::Display;

use alloy_primitives::{Address, B256, keccak256};
use flashpool_math::{
    swap_math::FEE_DENOMINATOR,
    tick_math::{MAX_TICK, MIN_TICK},
};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn uint_word(value: u32) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[28..].copy_from_slice(&value.to_be_bytes());
    word
}

fn int_word(value: i32) -> [u8; 32] {
    let mut word = if value < 0 { [0xff; 32] } else { [0u8; 32] };
    word[28..].copy_from_slice(&value.to_be_bytes());
    word
}

fn hash_words(words: &[[u8; 32]]) -> B256 {
    keccak256(words.concat())
}

/// Identifies a pool: a sorted token pair plus its fee, tick spacing and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub token0: Address,
    pub token1: Address,
    /// Swap fee in millionths of the input amount.
    pub fee: u32,
    pub tick_spacing: u32,
    /// The extension receiving the pool's hooks, or zero for none.
    pub extension: Address,
}

impl PoolKey {
    /// Creates a new [`PoolKey`] instance.
    #[must_use]
    pub const fn new(
        token0: Address,
        token1: Address,
        fee: u32,
        tick_spacing: u32,
        extension: Address,
    ) -> Self {
        Self {
            token0,
            token1,
            fee,
            tick_spacing,
            extension,
        }
    }

    /// Returns the slot identifier of this pool.
    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        PoolId(hash_words(&[
            address_word(self.token0),
            address_word(self.token1),
            uint_word(self.fee),
            uint_word(self.tick_spacing),
            address_word(self.extension),
        ]))
    }

    /// Returns the tick spacing as a signed tick distance.
    #[must_use]
    pub const fn spacing(&self) -> i32 {
        self.tick_spacing as i32
    }

    /// Returns whether the pool has an extension attached.
    #[must_use]
    pub fn has_extension(&self) -> bool {
        !self.extension.is_zero()
    }

    /// Checks that tokens are strictly sorted, the fee is below 100% and the tick
    /// spacing is within `1..=max_tick_spacing`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPoolKey`] describing the first violated rule.
    pub fn validate(&self, max_tick_spacing: u32) -> Result<(), LedgerError> {
        if self.token0 >= self.token1 {
            return Err(LedgerError::InvalidPoolKey(format!(
                "tokens must be sorted and distinct: {} >= {}",
                self.token0, self.token1
            )));
        }
        if self.fee >= FEE_DENOMINATOR {
            return Err(LedgerError::InvalidPoolKey(format!(
                "fee {} must be below {FEE_DENOMINATOR}",
                self.fee
            )));
        }
        if self.tick_spacing == 0 || self.tick_spacing > max_tick_spacing {
            return Err(LedgerError::InvalidPoolKey(format!(
                "tick spacing {} must be within 1..={max_tick_spacing}",
                self.tick_spacing
            )));
        }
        Ok(())
    }
}

/// The slot identifier of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub B256);

impl Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a position within a pool; the owner is the caller performing the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub salt: B256,
    pub lower: i32,
    pub upper: i32,
}

impl PositionKey {
    /// Creates a new [`PositionKey`] instance.
    #[must_use]
    pub const fn new(salt: B256, lower: i32, upper: i32) -> Self {
        Self { salt, lower, upper }
    }

    /// Returns the slot identifier of this position when owned by `owner`.
    #[must_use]
    pub fn position_id(&self, owner: Address) -> PositionId {
        PositionId(hash_words(&[
            address_word(owner),
            self.salt.0,
            int_word(self.lower),
            int_word(self.upper),
        ]))
    }

    /// Checks that the range is ordered, aligned to `tick_spacing` and within tick bounds.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRange`] describing the violated rule.
    pub fn validate(&self, tick_spacing: i32) -> Result<(), LedgerError> {
        if self.lower >= self.upper {
            return Err(LedgerError::InvalidRange(format!(
                "lower tick {} must be below upper tick {}",
                self.lower, self.upper
            )));
        }
        if self.lower < MIN_TICK || self.upper > MAX_TICK {
            return Err(LedgerError::InvalidRange(format!(
                "range [{}, {}] exceeds tick bounds [{MIN_TICK}, {MAX_TICK}]",
                self.lower, self.upper
            )));
        }
        if self.lower % tick_spacing != 0 || self.upper % tick_spacing != 0 {
            return Err(LedgerError::InvalidRange(format!(
                "range [{}, {}] is not aligned to tick spacing {tick_spacing}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// The slot identifier of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub B256);

impl Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The slot identifier of a saved balance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SavedBalanceKey(pub B256);

impl SavedBalanceKey {
    /// Derives the key of the bucket `owner` keeps for the sorted pair under `salt`.
    #[must_use]
    pub fn new(owner: Address, token0: Address, token1: Address, salt: B256) -> Self {
        Self(hash_words(&[
            address_word(owner),
            address_word(token0),
            address_word(token1),
            salt.0,
        ]))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
