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

//! Fixed-point and tick math for the flashpool settlement core.
//!
//! Prices are square roots in Q64.96 fixed point (`U160`), fee accumulators are Q128.128
//! per unit of liquidity (`U256`) and token amounts live in the 128-bit external domain.
//!
//! The crate deliberately exposes two distinct numeric wrappers:
//!
//! - [`WrappingFeeAccumulator`] for fee-per-liquidity values, whose absolute value is
//!   meaningless and whose differences are taken modulo 2^256.
//! - [`CheckedBoundedAmount`] for signed 128-bit balances, which never wrap.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod amount;
pub mod bit_math;
pub mod error;
pub mod fees;
pub mod full_math;
pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

pub use crate::{
    amount::CheckedBoundedAmount,
    error::MathError,
    fees::{FeesPerLiquidity, WrappingFeeAccumulator},
    full_math::{FullMath, Q96, Q128},
};
