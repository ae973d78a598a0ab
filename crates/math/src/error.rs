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

use alloy_primitives::U160;

/// Represents an error from fixed-point, tick or liquidity math.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Division by a zero denominator.
    #[error("Division by zero")]
    DivisionByZero,
    /// A result exceeded the bound of its representation.
    #[error("Overflow in {0}")]
    Overflow(&'static str),
    /// A result went below zero (or below its lower bound).
    #[error("Underflow in {0}")]
    Underflow(&'static str),
    /// A tick outside `[MIN_TICK, MAX_TICK]`.
    #[error("Tick {0} out of bounds")]
    TickOutOfBounds(i32),
    /// A sqrt ratio outside `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
    #[error("Sqrt ratio {0} out of bounds")]
    SqrtRatioOutOfBounds(U160),
    /// An operation that requires non-zero liquidity.
    #[error("Liquidity must be greater than zero")]
    ZeroLiquidity,
    /// The requested output exceeds the virtual reserves of the range.
    #[error("Price movement exceeds available reserves")]
    InvalidPriceMovement,
}
