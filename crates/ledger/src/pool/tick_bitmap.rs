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

use ahash::AHashMap;
use alloy_primitives::U256;
use flashpool_math::{
    bit_math::{least_significant_bit, most_significant_bit},
    tick_math::{MAX_TICK, MIN_TICK},
};

/// Splits a compressed tick into its word position and bit position.
fn tick_position(compressed: i32) -> (i32, u8) {
    (compressed >> 8, (compressed & 0xFF) as u8)
}

/// Bitmap of initialized ticks, one bit per multiple of the tick spacing.
#[derive(Debug, Clone)]
pub struct TickBitmap {
    words: AHashMap<i32, U256>,
    tick_spacing: i32,
}

impl TickBitmap {
    /// Creates a new empty [`TickBitmap`].
    #[must_use]
    pub fn new(tick_spacing: i32) -> Self {
        Self {
            words: AHashMap::new(),
            tick_spacing,
        }
    }

    /// Compresses `tick` to its spacing index, rounding towards negative infinity.
    fn compress(&self, tick: i32) -> i32 {
        tick.div_euclid(self.tick_spacing)
    }

    /// Toggles the bit of an aligned `tick`.
    pub fn flip_tick(&mut self, tick: i32) {
        debug_assert_eq!(tick % self.tick_spacing, 0, "tick {tick} not aligned");

        let (word_position, bit_position) = tick_position(self.compress(tick));
        let word = self.words.entry(word_position).or_insert(U256::ZERO);
        *word ^= U256::from(1u8) << bit_position;

        if word.is_zero() {
            self.words.remove(&word_position);
        }
    }

    #[must_use]
    pub fn is_initialized(&self, tick: i32) -> bool {
        let (word_position, bit_position) = tick_position(self.compress(tick));
        self.words
            .get(&word_position)
            .is_some_and(|word| word.bit(bit_position as usize))
    }

    /// Returns the next initialized tick within the word of `tick`, searching at or below it
    /// when `lte`, strictly above otherwise.
    ///
    /// When nothing is initialized the word boundary in the direction of travel is returned
    /// with `false`.
    #[must_use]
    pub fn next_initialized_tick_within_one_word(&self, tick: i32, lte: bool) -> (i32, bool) {
        let compressed = self.compress(tick);

        if lte {
            let (word_position, bit_position) = tick_position(compressed);
            // All bits at or to the right of the current bit
            let mask = (U256::from(1u8) << bit_position) - U256::from(1u8)
                + (U256::from(1u8) << bit_position);
            let masked = self.word(word_position) & mask;

            let initialized = !masked.is_zero();
            let next = if initialized {
                compressed - i32::from(bit_position) + i32::from(most_significant_bit(masked))
            } else {
                compressed - i32::from(bit_position)
            };
            (next * self.tick_spacing, initialized)
        } else {
            // Start from the next tick, the current one does not matter
            let (word_position, bit_position) = tick_position(compressed + 1);
            // All bits at or to the left of the bit
            let mask = !((U256::from(1u8) << bit_position) - U256::from(1u8));
            let masked = self.word(word_position) & mask;

            let initialized = !masked.is_zero();
            let next = if initialized {
                compressed + 1 + i32::from(least_significant_bit(masked)) - i32::from(bit_position)
            } else {
                compressed + 1 + 255 - i32::from(bit_position)
            };
            (next * self.tick_spacing, initialized)
        }
    }

    /// Returns the next initialized tick, crossing up to `skip_ahead` additional empty words.
    ///
    /// The result is clamped to the tick bounds; `false` means the returned tick is an
    /// uninitialized word boundary or a bound.
    #[must_use]
    pub fn next_initialized_tick(&self, tick: i32, lte: bool, skip_ahead: u32) -> (i32, bool) {
        let (mut next, mut initialized) = self.next_initialized_tick_within_one_word(tick, lte);
        let mut remaining = skip_ahead;

        while !initialized && remaining > 0 {
            if (lte && next <= MIN_TICK) || (!lte && next >= MAX_TICK) {
                break;
            }
            let from = if lte { next - 1 } else { next };
            (next, initialized) = self.next_initialized_tick_within_one_word(from, lte);
            remaining -= 1;
        }

        (next.clamp(MIN_TICK, MAX_TICK), initialized)
    }

    fn word(&self, word_position: i32) -> U256 {
        self.words.get(&word_position).copied().unwrap_or(U256::ZERO)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
