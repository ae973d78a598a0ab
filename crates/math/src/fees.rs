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

//! Fee-per-liquidity accumulators.
//!
//! Accumulators are Q128.128 fees per unit of liquidity. They only ever grow in the
//! mathematical sense but are stored modulo 2^256, so only differences between two snapshots
//! carry meaning. [`WrappingFeeAccumulator`] therefore exposes wrapping arithmetic and nothing
//! else, apart from the single explicitly checked [`WrappingFeeAccumulator::checked_rewind`].

use std::fmt::Display;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    error::MathError,
    full_math::{FullMath, Q128},
};

/// A single fee-per-liquidity value with intentional modulo 2^256 wraparound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WrappingFeeAccumulator(U256);

impl WrappingFeeAccumulator {
    pub const ZERO: Self = Self(U256::ZERO);

    /// Creates a new [`WrappingFeeAccumulator`] instance.
    #[must_use]
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns the raw stored value.
    #[must_use]
    pub const fn value(&self) -> U256 {
        self.0
    }

    /// Adds a per-liquidity increment, wrapping at 2^256.
    #[must_use]
    pub fn accumulate(self, per_liquidity: U256) -> Self {
        Self(self.0.wrapping_add(per_liquidity))
    }

    /// Returns `self - other` modulo 2^256.
    #[must_use]
    pub fn wrapping_sub(self, other: Self) -> Self {
        Self(self.0.wrapping_sub(other.0))
    }

    /// Subtracts an absolute per-liquidity amount, returning `None` instead of wrapping.
    ///
    /// Used only when re-expressing already realized fees against a new liquidity, where a
    /// wrapped result would corrupt every later fee read for the position.
    #[must_use]
    pub fn checked_rewind(self, per_liquidity: U256) -> Option<Self> {
        self.0.checked_sub(per_liquidity).map(Self)
    }

    /// Returns the fees owed to `liquidity` for the growth from `snapshot` to `self`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::Overflow`] if the fees exceed the 128-bit amount domain.
    pub fn fees_since(self, snapshot: Self, liquidity: u128) -> Result<u128, MathError> {
        let growth = self.wrapping_sub(snapshot).0;
        let fees = FullMath::mul_div(growth, U256::from(liquidity), Q128)?;
        FullMath::to_u128(fees, "fees")
    }
}

impl Display for WrappingFeeAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts a fee amount into a per-liquidity increment, `amount * 2^128 / liquidity`.
///
/// # Errors
///
/// Returns [`MathError::ZeroLiquidity`] if `liquidity` is zero.
pub fn per_liquidity(amount: u128, liquidity: u128) -> Result<U256, MathError> {
    if liquidity == 0 {
        return Err(MathError::ZeroLiquidity);
    }
    FullMath::mul_div(U256::from(amount), Q128, U256::from(liquidity))
}

/// Fee-per-liquidity accumulators for both tokens of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeesPerLiquidity {
    pub value0: WrappingFeeAccumulator,
    pub value1: WrappingFeeAccumulator,
}

impl FeesPerLiquidity {
    pub const ZERO: Self = Self {
        value0: WrappingFeeAccumulator::ZERO,
        value1: WrappingFeeAccumulator::ZERO,
    };

    /// Creates a new [`FeesPerLiquidity`] instance.
    #[must_use]
    pub const fn new(value0: U256, value1: U256) -> Self {
        Self {
            value0: WrappingFeeAccumulator::new(value0),
            value1: WrappingFeeAccumulator::new(value1),
        }
    }

    /// Returns the pairwise difference modulo 2^256.
    #[must_use]
    pub fn wrapping_sub(self, other: Self) -> Self {
        Self {
            value0: self.value0.wrapping_sub(other.value0),
            value1: self.value1.wrapping_sub(other.value1),
        }
    }

    /// Adds `amount0` and `amount1` of fees shared by `liquidity`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLiquidity`] if `liquidity` is zero.
    pub fn accumulate_amounts(
        self,
        amount0: u128,
        amount1: u128,
        liquidity: u128,
    ) -> Result<Self, MathError> {
        Ok(Self {
            value0: self.value0.accumulate(per_liquidity(amount0, liquidity)?),
            value1: self.value1.accumulate(per_liquidity(amount1, liquidity)?),
        })
    }

    /// Returns the fees owed to `liquidity` for the growth from `snapshot` to `self`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::Overflow`] if either amount exceeds the 128-bit amount domain.
    pub fn fees_since(self, snapshot: Self, liquidity: u128) -> Result<(u128, u128), MathError> {
        Ok((
            self.value0.fees_since(snapshot.value0, liquidity)?,
            self.value1.fees_since(snapshot.value1, liquidity)?,
        ))
    }

    /// Re-expresses realized fees against `liquidity` and subtracts them with a checked
    /// subtraction, yielding the snapshot under which those fees remain owed.
    ///
    /// Returns `Ok(None)` when either subtraction would wrap.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLiquidity`] if `liquidity` is zero.
    pub fn checked_rewind(
        self,
        fees0: u128,
        fees1: u128,
        liquidity: u128,
    ) -> Result<Option<Self>, MathError> {
        let rewind0 = per_liquidity(fees0, liquidity)?;
        let rewind1 = per_liquidity(fees1, liquidity)?;
        Ok(self
            .value0
            .checked_rewind(rewind0)
            .zip(self.value1.checked_rewind(rewind1))
            .map(|(value0, value1)| Self { value0, value1 }))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_accumulate_wraps_around() {
        let acc = WrappingFeeAccumulator::new(U256::MAX - U256::from(5));
        let wrapped = acc.accumulate(U256::from(10));

        assert_eq!(wrapped.value(), U256::from(4));
        assert_eq!(wrapped.wrapping_sub(acc).value(), U256::from(10));
    }

    #[rstest]
    fn test_fees_since_across_wraparound() {
        let snapshot = WrappingFeeAccumulator::new(U256::MAX - Q128 + U256::from(1));
        let now = snapshot.accumulate(Q128 * U256::from(3));

        assert!(now.value() < snapshot.value());
        assert_eq!(now.fees_since(snapshot, 7).unwrap(), 21);
    }

    #[rstest]
    fn test_fees_since_rounds_down() {
        let snapshot = WrappingFeeAccumulator::ZERO;
        let now = snapshot.accumulate(Q128 / U256::from(3));
        assert_eq!(now.fees_since(snapshot, 2).unwrap(), 0);
        assert_eq!(now.fees_since(snapshot, 3).unwrap(), 0);
        assert_eq!(now.fees_since(snapshot, 4).unwrap(), 1);
    }

    #[rstest]
    fn test_fees_since_overflow_is_reported() {
        let now = WrappingFeeAccumulator::new(U256::MAX);
        assert_eq!(
            now.fees_since(WrappingFeeAccumulator::ZERO, u128::MAX),
            Err(MathError::Overflow("fees"))
        );
    }

    #[rstest]
    fn test_checked_rewind_refuses_to_wrap() {
        let acc = WrappingFeeAccumulator::new(U256::from(100));
        assert_eq!(
            acc.checked_rewind(U256::from(40)),
            Some(WrappingFeeAccumulator::new(U256::from(60)))
        );
        assert_eq!(acc.checked_rewind(U256::from(101)), None);
    }

    #[rstest]
    fn test_per_liquidity_zero_liquidity() {
        assert_eq!(per_liquidity(5, 0), Err(MathError::ZeroLiquidity));
        assert_eq!(per_liquidity(5, 1).unwrap(), Q128 * U256::from(5));
    }

    #[rstest]
    fn test_pair_accumulate_and_fees_since() {
        let start = FeesPerLiquidity::ZERO;
        let after = start.accumulate_amounts(300, 600, 1_000).unwrap();

        assert_eq!(after.fees_since(start, 1_000).unwrap(), (299, 599));
        assert_eq!(after.fees_since(start, 500).unwrap(), (149, 299));
        assert_eq!(after.wrapping_sub(start), after);
    }

    #[rstest]
    fn test_pair_checked_rewind_keeps_fees_owed() {
        let inside = FeesPerLiquidity::new(Q128 * U256::from(10), Q128 * U256::from(20));
        let rewound = inside.checked_rewind(5, 5, 1).unwrap().unwrap();

        assert_eq!(inside.fees_since(rewound, 1).unwrap(), (5, 5));
        assert_eq!(inside.checked_rewind(11, 0, 1).unwrap(), None);
    }

    proptest! {
        #[test]
        fn prop_differences_survive_wraparound(
            start in any::<[u64; 4]>(),
            steps in prop::collection::vec(0u128..u128::MAX, 1..8),
        ) {
            let start = WrappingFeeAccumulator::new(U256::from_limbs(start));
            let mut acc = start;
            let mut total = U256::ZERO;
            for step in steps {
                acc = acc.accumulate(U256::from(step));
                total += U256::from(step);
            }
            prop_assert_eq!(acc.wrapping_sub(start).value(), total);
        }
    }
}
