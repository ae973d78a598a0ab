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
    tick_math::get_sqrt_ratio_at_tick,
};

/// Encodes `sqrt(amount1 / amount0)` as a Q64.96 number.
///
/// # Errors
///
/// Returns an error if `amount0` is zero or the ratio is not representable.
pub fn encode_sqrt_ratio_x96(amount1: u128, amount0: u128) -> Result<U160, MathError> {
    let ratio_x192 = FullMath::mul_div(
        U256::from(amount1),
        U256::from(1) << 192,
        U256::from(amount0),
    )?;
    FullMath::to_u160(FullMath::sqrt(ratio_x192), "sqrt price")
}

/// Calculates the next sqrt price after adding or removing `amount` of token0, rounding up.
fn get_next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: U160,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U160, MathError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }

    let numerator: U256 = U256::from(liquidity) << 96;
    let sqrt_price = U256::from(sqrt_price_x96);
    let product = amount.checked_mul(sqrt_price);

    if add {
        if let Some(product) = product
            && let Some(denominator) = numerator.checked_add(product)
        {
            // Always fits 160 bits since denominator >= numerator
            let result = FullMath::mul_div_rounding_up(numerator, sqrt_price, denominator)?;
            return FullMath::to_u160(result, "sqrt price");
        }
        let denominator = (numerator / sqrt_price)
            .checked_add(amount)
            .ok_or(MathError::Overflow("sqrt price denominator"))?;
        FullMath::to_u160(
            FullMath::div_rounding_up(numerator, denominator)?,
            "sqrt price",
        )
    } else {
        let product = match product {
            Some(product) if numerator > product => product,
            _ => return Err(MathError::InvalidPriceMovement),
        };
        let result = FullMath::mul_div_rounding_up(numerator, sqrt_price, numerator - product)?;
        FullMath::to_u160(result, "sqrt price")
    }
}

/// Calculates the next sqrt price after adding or removing `amount` of token1, rounding down.
fn get_next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: U160,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U160, MathError> {
    let liquidity = U256::from(liquidity);
    let sqrt_price = U256::from(sqrt_price_x96);
    // Avoid a mul_div for amounts that fit in 160 bits
    let fits = amount <= U256::from(U160::MAX);

    if add {
        let quotient = if fits {
            (amount << 96) / liquidity
        } else {
            FullMath::mul_div(amount, Q96, liquidity)?
        };
        let next = sqrt_price
            .checked_add(quotient)
            .ok_or(MathError::Overflow("sqrt price"))?;
        FullMath::to_u160(next, "sqrt price")
    } else {
        let quotient = if fits {
            FullMath::div_rounding_up(amount << 96, liquidity)?
        } else {
            FullMath::mul_div_rounding_up(amount, Q96, liquidity)?
        };
        if sqrt_price <= quotient {
            return Err(MathError::InvalidPriceMovement);
        }
        FullMath::to_u160(sqrt_price - quotient, "sqrt price")
    }
}

/// Calculates the next sqrt price given an input amount of token0 or token1.
///
/// # Errors
///
/// Returns an error if the price or liquidity is zero, or the next price is not representable.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U160,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U160, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtRatioOutOfBounds(sqrt_price_x96));
    }
    if liquidity == 0 {
        return Err(MathError::ZeroLiquidity);
    }

    // Round to make sure that we don't pass the target price
    if zero_for_one {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Calculates the next sqrt price given an output amount of token0 or token1.
///
/// # Errors
///
/// Returns an error if the price or liquidity is zero, or the output exceeds the virtual reserves.
pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U160,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U160, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtRatioOutOfBounds(sqrt_price_x96));
    }
    if liquidity == 0 {
        return Err(MathError::ZeroLiquidity);
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

/// Calculates `liquidity / sqrt(lower) - liquidity / sqrt(upper)`, the token0 delta between
/// two prices.
///
/// # Errors
///
/// Returns an error if the lower price is zero or the result does not fit in 256 bits.
pub fn get_amount0_delta(
    sqrt_ratio_ax96: U160,
    sqrt_ratio_bx96: U160,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (sqrt_ratio_a, sqrt_ratio_b) = if sqrt_ratio_ax96 > sqrt_ratio_bx96 {
        (U256::from(sqrt_ratio_bx96), U256::from(sqrt_ratio_ax96))
    } else {
        (U256::from(sqrt_ratio_ax96), U256::from(sqrt_ratio_bx96))
    };
    if sqrt_ratio_a.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let numerator1: U256 = U256::from(liquidity) << 96;
    let numerator2 = sqrt_ratio_b - sqrt_ratio_a;

    if round_up {
        let result = FullMath::mul_div_rounding_up(numerator1, numerator2, sqrt_ratio_b)?;
        FullMath::div_rounding_up(result, sqrt_ratio_a)
    } else {
        Ok(FullMath::mul_div(numerator1, numerator2, sqrt_ratio_b)? / sqrt_ratio_a)
    }
}

/// Calculates `liquidity * (sqrt(upper) - sqrt(lower))`, the token1 delta between two prices.
///
/// # Errors
///
/// Returns an error if the result does not fit in 256 bits.
pub fn get_amount1_delta(
    sqrt_ratio_ax96: U160,
    sqrt_ratio_bx96: U160,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let diff = if sqrt_ratio_ax96 > sqrt_ratio_bx96 {
        U256::from(sqrt_ratio_ax96 - sqrt_ratio_bx96)
    } else {
        U256::from(sqrt_ratio_bx96 - sqrt_ratio_ax96)
    };

    if round_up {
        FullMath::mul_div_rounding_up(U256::from(liquidity), diff, Q96)
    } else {
        FullMath::mul_div(U256::from(liquidity), diff, Q96)
    }
}

/// Calculates the token amounts backing `liquidity` over `[tick_lower, tick_upper)` at the
/// given price.
///
/// # Errors
///
/// Returns an error if a tick is out of bounds or an amount does not fit in 256 bits.
pub fn get_amounts_for_liquidity(
    sqrt_ratio_x96: U160,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
    round_up: bool,
) -> Result<(U256, U256), MathError> {
    let sqrt_ratio_lower = get_sqrt_ratio_at_tick(tick_lower)?;
    let sqrt_ratio_upper = get_sqrt_ratio_at_tick(tick_upper)?;
    let (sqrt_ratio_a, sqrt_ratio_b) = if sqrt_ratio_lower > sqrt_ratio_upper {
        (sqrt_ratio_upper, sqrt_ratio_lower)
    } else {
        (sqrt_ratio_lower, sqrt_ratio_upper)
    };

    if sqrt_ratio_x96 <= sqrt_ratio_a {
        // Price below the range, all liquidity is in token0
        let amount0 = get_amount0_delta(sqrt_ratio_a, sqrt_ratio_b, liquidity, round_up)?;
        Ok((amount0, U256::ZERO))
    } else if sqrt_ratio_x96 < sqrt_ratio_b {
        let amount0 = get_amount0_delta(sqrt_ratio_x96, sqrt_ratio_b, liquidity, round_up)?;
        let amount1 = get_amount1_delta(sqrt_ratio_a, sqrt_ratio_x96, liquidity, round_up)?;
        Ok((amount0, amount1))
    } else {
        // Price above the range, all liquidity is in token1
        let amount1 = get_amount1_delta(sqrt_ratio_a, sqrt_ratio_b, liquidity, round_up)?;
        Ok((U256::ZERO, amount1))
    }
}

/// Expands an amount to 18 decimal places (multiplies by 10^18).
#[must_use]
pub fn expand_to_18_decimals(amount: u64) -> u128 {
    u128::from(amount) * 10u128.pow(18)
}
