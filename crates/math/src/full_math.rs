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

use alloy_primitives::{U160, U256, U512};

use crate::error::MathError;

/// 2^96, the resolution of Q64.96 sqrt prices.
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

/// 2^128, the resolution of fee-per-liquidity accumulators.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

/// Full precision multiplication and division with 512-bit intermediates.
#[derive(Debug, Clone, Copy)]
pub struct FullMath;

impl FullMath {
    /// Calculates `floor(a * b / denominator)` without overflowing the intermediate product.
    ///
    /// # Errors
    ///
    /// Returns an error if `denominator` is zero or the result does not fit in 256 bits.
    pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
        if denominator.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let product = U512::from(a) * U512::from(b);
        Self::narrow(product / U512::from(denominator))
    }

    /// Calculates `ceil(a * b / denominator)` without overflowing the intermediate product.
    ///
    /// # Errors
    ///
    /// Returns an error if `denominator` is zero or the result does not fit in 256 bits.
    pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
        if denominator.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let product = U512::from(a) * U512::from(b);
        let denominator = U512::from(denominator);
        let mut result = product / denominator;
        if !(product % denominator).is_zero() {
            result += U512::from(1);
        }
        Self::narrow(result)
    }

    /// Calculates `ceil(a / b)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `b` is zero.
    pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
        if b.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let quotient = a / b;
        if (a % b).is_zero() {
            Ok(quotient)
        } else {
            Ok(quotient + U256::from(1))
        }
    }

    /// Integer square root (floor) by Newton's method.
    #[must_use]
    pub fn sqrt(x: U256) -> U256 {
        if x.is_zero() {
            return U256::ZERO;
        }
        let mut y = x;
        let mut z = (x >> 1) + U256::from(1);
        while z < y {
            y = z;
            z = (x / z + z) >> 1;
        }
        y
    }

    /// Converts to `u128`, failing rather than truncating.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::Overflow`] naming `what` if `x` exceeds `u128::MAX`.
    pub fn to_u128(x: U256, what: &'static str) -> Result<u128, MathError> {
        if x > U256::from(u128::MAX) {
            return Err(MathError::Overflow(what));
        }
        Ok(x.to::<u128>())
    }

    /// Converts to `U160`, failing rather than truncating.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::Overflow`] naming `what` if `x` exceeds `U160::MAX`.
    pub fn to_u160(x: U256, what: &'static str) -> Result<U160, MathError> {
        if x > U256::from(U160::MAX) {
            return Err(MathError::Overflow(what));
        }
        Ok(U160::from(x))
    }

    fn narrow(x: U512) -> Result<U256, MathError> {
        if x > U512::from(U256::MAX) {
            return Err(MathError::Overflow("mul_div"));
        }
        Ok(U256::from(x))
    }
}
