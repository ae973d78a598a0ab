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
    full_math::FullMath,
    sqrt_price_math::{
        get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input,
        get_next_sqrt_price_from_output,
    },
};

/// Fee denominator: fees are expressed in hundredths of a bip.
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// Result of swapping within a single price range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    /// The sqrt price after this step.
    pub sqrt_ratio_next_x96: U160,
    /// Amount of input token consumed, excluding fees.
    pub amount_in: U256,
    /// Amount of output token produced.
    pub amount_out: U256,
    /// Fee taken from the input token.
    pub fee_amount: U256,
}

/// Computes the result of swapping some amount in, or out, given the parameters of the swap.
///
/// The direction is implied by the prices: the swap is token0 for token1 when the target is
/// at or below the current price. A positive `amount_remaining` is an exact input, a negative
/// one an exact output.
///
/// # Errors
///
/// Returns an error if any intermediate price or amount is not representable.
pub fn compute_swap_step(
    sqrt_ratio_current_x96: U160,
    sqrt_ratio_target_x96: U160,
    liquidity: u128,
    amount_remaining: i128,
    fee_pips: u32,
) -> Result<SwapStep, MathError> {
    let zero_for_one = sqrt_ratio_current_x96 >= sqrt_ratio_target_x96;
    let exact_in = amount_remaining >= 0;
    let remaining = U256::from(amount_remaining.unsigned_abs());
    let fee = U256::from(fee_pips);
    let denominator = U256::from(FEE_DENOMINATOR);

    let sqrt_ratio_next_x96;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee =
            FullMath::mul_div(remaining, denominator - fee, denominator)?;
        amount_in = if zero_for_one {
            get_amount0_delta(sqrt_ratio_target_x96, sqrt_ratio_current_x96, liquidity, true)?
        } else {
            get_amount1_delta(sqrt_ratio_current_x96, sqrt_ratio_target_x96, liquidity, true)?
        };
        sqrt_ratio_next_x96 = if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_input(
                sqrt_ratio_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
    } else {
        amount_out = if zero_for_one {
            get_amount1_delta(sqrt_ratio_target_x96, sqrt_ratio_current_x96, liquidity, false)?
        } else {
            get_amount0_delta(sqrt_ratio_current_x96, sqrt_ratio_target_x96, liquidity, false)?
        };
        sqrt_ratio_next_x96 = if remaining >= amount_out {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_output(
                sqrt_ratio_current_x96,
                liquidity,
                remaining,
                zero_for_one,
            )?
        };
    }

    let max = sqrt_ratio_target_x96 == sqrt_ratio_next_x96;

    // Get the input/output amounts
    if zero_for_one {
        if !(max && exact_in) {
            amount_in =
                get_amount0_delta(sqrt_ratio_next_x96, sqrt_ratio_current_x96, liquidity, true)?;
        }
        if !(max && !exact_in) {
            amount_out =
                get_amount1_delta(sqrt_ratio_next_x96, sqrt_ratio_current_x96, liquidity, false)?;
        }
    } else {
        if !(max && exact_in) {
            amount_in =
                get_amount1_delta(sqrt_ratio_current_x96, sqrt_ratio_next_x96, liquidity, true)?;
        }
        if !(max && !exact_in) {
            amount_out =
                get_amount0_delta(sqrt_ratio_current_x96, sqrt_ratio_next_x96, liquidity, false)?;
        }
    }

    // Cap the output amount to not exceed the remaining output amount
    if !exact_in && amount_out > remaining {
        amount_out = remaining;
    }

    let fee_amount = if exact_in && sqrt_ratio_next_x96 != sqrt_ratio_target_x96 {
        // Didn't reach the target, so take the remainder of the maximum input as fee
        remaining - amount_in
    } else {
        FullMath::mul_div_rounding_up(amount_in, fee, denominator - fee)?
    };

    Ok(SwapStep {
        sqrt_ratio_next_x96,
        amount_in,
        amount_out,
        fee_amount,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;
    use crate::sqrt_price_math::{encode_sqrt_ratio_x96, expand_to_18_decimals};

    fn price(amount1: u128, amount0: u128) -> U160 {
        encode_sqrt_ratio_x96(amount1, amount0).unwrap()
    }

    #[rstest]
    fn test_exact_amount_in_that_gets_capped_at_price_target_one_for_zero() {
        let current = price(1, 1);
        let target = price(101, 100);
        let liquidity = expand_to_18_decimals(2);
        let amount = expand_to_18_decimals(1) as i128;

        let step = compute_swap_step(current, target, liquidity, amount, 600).unwrap();

        assert_eq!(step.amount_in, U256::from(9_975_124_224_178_055_u128));
        assert_eq!(step.fee_amount, U256::from(5_988_667_735_148_u128));
        assert_eq!(step.amount_out, U256::from(9_925_619_580_021_728_u128));
        assert!(step.amount_in + step.fee_amount < U256::from(amount as u128));
        assert_eq!(step.sqrt_ratio_next_x96, target);
    }

    #[rstest]
    fn test_exact_amount_out_that_gets_capped_at_price_target_one_for_zero() {
        let current = price(1, 1);
        let target = price(101, 100);
        let liquidity = expand_to_18_decimals(2);
        let amount = -(expand_to_18_decimals(1) as i128);

        let step = compute_swap_step(current, target, liquidity, amount, 600).unwrap();

        assert_eq!(step.amount_in, U256::from(9_975_124_224_178_055_u128));
        assert_eq!(step.fee_amount, U256::from(5_988_667_735_148_u128));
        assert_eq!(step.amount_out, U256::from(9_925_619_580_021_728_u128));
        assert!(step.amount_out < U256::from(amount.unsigned_abs()));
        assert_eq!(step.sqrt_ratio_next_x96, target);
    }

    #[rstest]
    fn test_exact_amount_in_that_is_fully_spent_one_for_zero() {
        let current = price(1, 1);
        let target = price(1000, 100);
        let liquidity = expand_to_18_decimals(2);
        let amount = expand_to_18_decimals(1) as i128;

        let step = compute_swap_step(current, target, liquidity, amount, 600).unwrap();

        assert_eq!(step.amount_in, U256::from(999_400_000_000_000_000_u128));
        assert_eq!(step.fee_amount, U256::from(600_000_000_000_000_u128));
        assert_eq!(step.amount_out, U256::from(666_399_946_655_997_866_u128));
        assert_eq!(step.amount_in + step.fee_amount, U256::from(amount as u128));
        assert!(step.sqrt_ratio_next_x96 < target);
    }

    #[rstest]
    fn test_exact_amount_out_that_is_fully_received_one_for_zero() {
        let current = price(1, 1);
        let target = price(10000, 100);
        let liquidity = expand_to_18_decimals(2);
        let amount = -(expand_to_18_decimals(1) as i128);

        let step = compute_swap_step(current, target, liquidity, amount, 600).unwrap();

        assert_eq!(step.amount_in, U256::from(2_000_000_000_000_000_000_u128));
        assert_eq!(step.fee_amount, U256::from(1_200_720_432_259_356_u128));
        assert_eq!(step.amount_out, U256::from(amount.unsigned_abs()));
        assert!(step.sqrt_ratio_next_x96 < target);
    }

    #[rstest]
    fn test_amount_out_is_capped_at_desired_amount_out() {
        let step = compute_swap_step(
            U160::from_str("417332158212080721273783715441582").unwrap(),
            U160::from_str("1452870262520218020823638996").unwrap(),
            159_344_665_391_607_089_467_575_320_103,
            -1,
            1,
        )
        .unwrap();

        assert_eq!(step.amount_in, U256::from(1));
        assert_eq!(step.fee_amount, U256::from(1));
        assert_eq!(step.amount_out, U256::from(1));
        assert_eq!(
            step.sqrt_ratio_next_x96,
            U160::from_str("417332158212080721273783715441581").unwrap()
        );
    }

    #[rstest]
    fn test_target_price_of_1_uses_partial_input_amount() {
        let step = compute_swap_step(
            U160::from(2),
            U160::from(1),
            1,
            3_915_081_100_057_732_413_702_495_386_755_767,
            1,
        )
        .unwrap();

        assert_eq!(
            step.amount_in,
            U256::from(39_614_081_257_132_168_796_771_975_168_u128)
        );
        assert_eq!(
            step.fee_amount,
            U256::from(39_614_120_871_253_040_049_813_u128)
        );
        let max_in = U256::from(3_915_081_100_057_732_413_702_495_386_755_767_u128);
        assert!(step.amount_in + step.fee_amount <= max_in);
        assert_eq!(step.amount_out, U256::ZERO);
        assert_eq!(step.sqrt_ratio_next_x96, U160::from(1));
    }

    #[rstest]
    fn test_entire_input_amount_taken_as_fee() {
        let step = compute_swap_step(
            U160::from(2413),
            U160::from_str("79887613182836312").unwrap(),
            1_985_041_575_832_132_834_610_021_537_970,
            10,
            1872,
        )
        .unwrap();

        assert_eq!(step.amount_in, U256::ZERO);
        assert_eq!(step.fee_amount, U256::from(10));
        assert_eq!(step.amount_out, U256::ZERO);
        assert_eq!(step.sqrt_ratio_next_x96, U160::from(2413));
    }

    #[rstest]
    fn test_zero_liquidity_moves_straight_to_target() {
        let current = price(1, 1);
        let target = price(101, 100);

        let exact_in = compute_swap_step(current, target, 0, 1_000, 3000).unwrap();
        assert_eq!(exact_in.sqrt_ratio_next_x96, target);
        assert_eq!(exact_in.amount_in, U256::ZERO);
        assert_eq!(exact_in.fee_amount, U256::ZERO);

        let exact_out = compute_swap_step(current, target, 0, -1_000, 3000).unwrap();
        assert_eq!(exact_out.sqrt_ratio_next_x96, target);
        assert_eq!(exact_out.amount_out, U256::ZERO);
    }
}
