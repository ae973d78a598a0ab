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

use alloy_primitives::U256;

/// Returns the index of the most significant set bit of `x`.
///
/// # Panics
///
/// Panics if `x` is zero.
#[must_use]
pub fn most_significant_bit(x: U256) -> u8 {
    assert!(!x.is_zero(), "x must be greater than zero");
    (x.bit_len() - 1) as u8
}

/// Returns the index of the least significant set bit of `x`.
///
/// # Panics
///
/// Panics if `x` is zero.
#[must_use]
pub fn least_significant_bit(x: U256) -> u8 {
    assert!(!x.is_zero(), "x must be greater than zero");
    x.trailing_zeros() as u8
}
