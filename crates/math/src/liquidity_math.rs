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

use crate::{
    error::MathError,
    full_math::{FullMath, Q96},
    tick_math::{get_max_tick, get_min_tick},
};

/// Adds a signed liquidity delta to `x`, failing on overflow or underflow.
///
/// # Errors
///
/// Returns [`MathError::Underflow`] if the result would be negative, or
/// [`MathError::Overflow`] if it would exceed `u128::MAX`.
pub fn add_delta(x: u128, y: i128) -> Result<u128, MathError> {
    if y < 0 {
        x.checked_sub(y.unsigned_abs())
            .ok_or(MathError::Underflow("liquidity"))
    } else {
        x.checked_add(y.unsigned_abs())
            .ok_or(MathError::Overflow("liquidity"))
    }
}

/// Derives max liquidity per tick from a given tick spacing.
#[must_use]
pub fn tick_spacing_to_max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = get_min_tick(tick_spacing);
    let max_tick = get_max_tick(tick_spacing);
    let num_ticks = ((i64::from(max_tick) - i64::from(min_tick)) / i64::from(tick_spacing)) + 1;

    u128::MAX / num_ticks as u128
}

/// Computes the liquidity received for `amount0` over the price range `[a, b]`.
///
/// # Errors
///
/// Returns an error if the prices are equal or the liquidity exceeds `u128::MAX`.
pub fn get_liquidity_for_amount0(
    sqrt_ratio_ax96: U160,
    sqrt_ratio_bx96: U160,
    amount0: u128,
) -> Result<u128, MathError> {
    let (a, b) = sorted(sqrt_ratio_ax96, sqrt_ratio_bx96);
    let intermediate = FullMath::mul_div(a, b, Q96)?;
    let liquidity = FullMath::mul_div(U256::from(amount0), intermediate, b - a)?;
    FullMath::to_u128(liquidity, "liquidity")
}

/// Computes the liquidity received for `amount1` over the price range `[a, b]`.
///
/// # Errors
///
/// Returns an error if the prices are equal or the liquidity exceeds `u128::MAX`.
pub fn get_liquidity_for_amount1(
    sqrt_ratio_ax96: U160,
    sqrt_ratio_bx96: U160,
    amount1: u128,
) -> Result<u128, MathError> {
    let (a, b) = sorted(sqrt_ratio_ax96, sqrt_ratio_bx96);
    let liquidity = FullMath::mul_div(U256::from(amount1), Q96, b - a)?;
    FullMath::to_u128(liquidity, "liquidity")
}

/// Computes the maximum liquidity that `amount0` and `amount1` can back over `[a, b]` at the
/// current price.
///
/// # Errors
///
/// Returns an error if the range is empty or the liquidity exceeds `u128::MAX`.
pub fn get_liquidity_for_amounts(
    sqrt_ratio_x96: U160,
    sqrt_ratio_ax96: U160,
    sqrt_ratio_bx96: U160,
    amount0: u128,
    amount1: u128,
) -> Result<u128, MathError> {
    let (a, b) = if sqrt_ratio_ax96 > sqrt_ratio_bx96 {
        (sqrt_ratio_bx96, sqrt_ratio_ax96)
    } else {
        (sqrt_ratio_ax96, sqrt_ratio_bx96)
    };

    if sqrt_ratio_x96 <= a {
        get_liquidity_for_amount0(a, b, amount0)
    } else if sqrt_ratio_x96 < b {
        let liquidity0 = get_liquidity_for_amount0(sqrt_ratio_x96, b, amount0)?;
        let liquidity1 = get_liquidity_for_amount1(a, sqrt_ratio_x96, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        get_liquidity_for_amount1(a, b, amount1)
    }
}

fn sorted(a: U160, b: U160) -> (U256, U256) {
    if a > b {
        (U256::from(b), U256::from(a))
    } else {
        (U256::from(a), U256::from(b))
    }
}
