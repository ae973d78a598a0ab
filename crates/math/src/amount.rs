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

use std::fmt::Display;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A signed amount bounded to the 128-bit external token domain.
///
/// Unlike [`WrappingFeeAccumulator`](crate::WrappingFeeAccumulator), every operation is checked
/// and there is deliberately no wrapping arithmetic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CheckedBoundedAmount(i128);

impl CheckedBoundedAmount {
    pub const ZERO: Self = Self(0);

    /// Creates a new [`CheckedBoundedAmount`] instance.
    #[must_use]
    pub const fn new(value: i128) -> Self {
        Self(value)
    }

    /// Creates an amount from an unsigned value, `None` if it exceeds `i128::MAX`.
    #[must_use]
    pub fn from_unsigned(value: u128) -> Option<Self> {
        i128::try_from(value).ok().map(Self)
    }

    /// Creates an amount from a 256-bit value, `None` if it exceeds `i128::MAX`.
    #[must_use]
    pub fn from_u256(value: U256) -> Option<Self> {
        if value > U256::from(i128::MAX as u128) {
            return None;
        }
        Some(Self(value.to::<u128>() as i128))
    }

    #[must_use]
    pub const fn value(&self) -> i128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn checked_add(self, delta: i128) -> Option<Self> {
        self.0.checked_add(delta).map(Self)
    }

    #[must_use]
    pub fn checked_sub(self, delta: i128) -> Option<Self> {
        self.0.checked_sub(delta).map(Self)
    }

    #[must_use]
    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }
}

impl Display for CheckedBoundedAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
