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

use alloy_primitives::Address;
use flashpool_math::{swap_math::FEE_DENOMINATOR, tick_math::MAX_TICK};
use serde::{Deserialize, Serialize};

/// The largest tick spacing a pool may use unless configured otherwise.
pub const DEFAULT_MAX_TICK_SPACING: u32 = 32_767;

/// Configuration for [`crate::Ledger`] instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The ledger's own account in the token model.
    pub address: Address,
    /// The account allowed to withdraw accrued protocol fees.
    pub owner: Address,
    /// The protocol fee taken from liquidity withdrawals, in millionths.
    pub withdrawal_fee_pips: u32,
    /// The maximum tick spacing a pool key may declare.
    pub max_tick_spacing: u32,
    /// If failures of the collect-fees hooks are rolled back and logged instead of
    /// aborting the collection.
    pub isolate_fee_collection_hooks: bool,
    /// If extra debug logging is enabled.
    pub debug: bool,
}

impl Default for LedgerConfig {
    /// Creates a new default [`LedgerConfig`] instance.
    fn default() -> Self {
        Self {
            address: Address::with_last_byte(0xf1),
            owner: Address::with_last_byte(0x0f),
            withdrawal_fee_pips: 0,
            max_tick_spacing: DEFAULT_MAX_TICK_SPACING,
            isolate_fee_collection_hooks: false,
            debug: false,
        }
    }
}

impl LedgerConfig {
    /// Creates a new [`LedgerConfig`] instance.
    #[must_use]
    pub const fn new(
        address: Address,
        owner: Address,
        withdrawal_fee_pips: u32,
        max_tick_spacing: u32,
        isolate_fee_collection_hooks: bool,
        debug: bool,
    ) -> Self {
        Self {
            address,
            owner,
            withdrawal_fee_pips,
            max_tick_spacing,
            isolate_fee_collection_hooks,
            debug,
        }
    }

    /// Parses a configuration from JSON bytes and validates it. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid JSON for a [`LedgerConfig`] or the result
    /// fails [`LedgerConfig::validate`].
    pub fn from_json_bytes(data: &[u8]) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger address is zero or equals the owner, if the
    /// withdrawal fee is not below 100%, or if the maximum tick spacing is outside
    /// `1..=MAX_TICK`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.address.is_zero() {
            anyhow::bail!("Ledger address must not be zero");
        }
        if self.address == self.owner {
            anyhow::bail!("Ledger address {} must differ from the owner", self.address);
        }
        if self.withdrawal_fee_pips >= FEE_DENOMINATOR {
            anyhow::bail!(
                "Withdrawal fee {} must be below {FEE_DENOMINATOR} pips",
                self.withdrawal_fee_pips
            );
        }
        if self.max_tick_spacing == 0 || self.max_tick_spacing > MAX_TICK as u32 {
            anyhow::bail!(
                "Max tick spacing {} must be within 1..={MAX_TICK}",
                self.max_tick_spacing
            );
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
