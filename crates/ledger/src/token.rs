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

//! The abstract token model: balances, pluggable call behaviour and result classification.

use std::fmt::{Debug, Display};

use ahash::AHashMap;
use alloy_primitives::{Address, Bytes, U256};

use crate::ledger::Ledger;

/// Raw outcome of an external token call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call reverted with a reason.
    Reverted(String),
    /// The call returned, possibly with no data.
    Returned(Bytes),
}

/// Classification of a transfer call's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    /// The call reverted.
    Failed(String),
    /// The call returned the ABI encoding of `true`.
    Succeeded,
    /// The call returned nothing, as some token implementations do.
    NoReturnData,
    /// The call returned data that is not the ABI encoding of `true`.
    InvalidReturnData,
}

impl TransferStatus {
    /// Classifies a transfer outcome.
    ///
    /// Return data shorter than one word is never read as a boolean.
    #[must_use]
    pub fn classify(outcome: &CallOutcome) -> Self {
        match outcome {
            CallOutcome::Reverted(reason) => Self::Failed(reason.clone()),
            CallOutcome::Returned(data) if data.is_empty() => Self::NoReturnData,
            CallOutcome::Returned(data) if data.len() < 32 => Self::InvalidReturnData,
            CallOutcome::Returned(data) => {
                if U256::from_be_slice(&data[..32]) == U256::from(1u8) {
                    Self::Succeeded
                } else {
                    Self::InvalidReturnData
                }
            }
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::NoReturnData)
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "reverted: {reason}"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::NoReturnData => write!(f, "succeeded without return data"),
            Self::InvalidReturnData => write!(f, "invalid return data"),
        }
    }
}

/// ABI-encodes a boolean as one word.
#[must_use]
pub fn encode_bool(value: bool) -> Bytes {
    encode_uint(u128::from(value))
}

/// ABI-encodes an unsigned amount as one word.
#[must_use]
pub fn encode_uint(value: u128) -> Bytes {
    Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec())
}

/// Decodes a `balanceOf` return value, which must be exactly one word long.
///
/// # Errors
///
/// Returns a description of the problem if the call reverted or returned anything but
/// one word.
pub fn decode_balance(outcome: &CallOutcome) -> Result<U256, String> {
    match outcome {
        CallOutcome::Reverted(reason) => Err(format!("reverted: {reason}")),
        CallOutcome::Returned(data) if data.len() != 32 => {
            Err(format!("expected 32 bytes of return data, received {}", data.len()))
        }
        CallOutcome::Returned(data) => Ok(U256::from_be_slice(&data[..])),
    }
}

/// How a token responds to calls, beyond the balance bookkeeping of [`TokenBank`].
///
/// The default implementation behaves like a standard token.
#[allow(unused_variables)]
pub trait TokenBehavior: Debug {
    /// Called after `amount` moved from `from` to `to`; the returned outcome is what the
    /// caller observes. The ledger is passed so the token can re-enter it.
    fn on_transfer(
        &self,
        ledger: &mut Ledger,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> CallOutcome {
        CallOutcome::Returned(encode_bool(true))
    }

    /// Returns the raw outcome of a balance query for an account holding `balance`.
    fn on_balance_of(&self, token: Address, owner: Address, balance: u128) -> CallOutcome {
        CallOutcome::Returned(encode_uint(balance))
    }
}

/// A token without any quirks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardToken;

impl TokenBehavior for StandardToken {}

/// Token balances per `(token, owner)`.
#[derive(Debug, Clone, Default)]
pub struct TokenBank {
    balances: AHashMap<(Address, Address), u128>,
}

impl TokenBank {
    /// Creates a new empty [`TokenBank`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn balance_of(&self, token: Address, owner: Address) -> u128 {
        self.balances.get(&(token, owner)).copied().unwrap_or(0)
    }

    /// Credits `amount` of `token` to `owner` out of thin air.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance would exceed `u128::MAX`.
    pub fn mint(&mut self, token: Address, owner: Address, amount: u128) -> anyhow::Result<()> {
        let balance = self.balance_of(token, owner);
        let Some(next) = balance.checked_add(amount) else {
            anyhow::bail!("Balance of {owner} in {token} would overflow");
        };
        self.set(token, owner, next);
        Ok(())
    }

    /// Moves `amount` of `token` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` holds less than `amount` or `to` would overflow.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> anyhow::Result<()> {
        let from_balance = self.balance_of(token, from);
        let Some(from_next) = from_balance.checked_sub(amount) else {
            anyhow::bail!("Insufficient balance: {from} holds {from_balance}, needs {amount}");
        };
        if from == to {
            return Ok(());
        }

        let to_balance = self.balance_of(token, to);
        let Some(to_next) = to_balance.checked_add(amount) else {
            anyhow::bail!("Balance of {to} in {token} would overflow");
        };
        self.set(token, from, from_next);
        self.set(token, to, to_next);
        Ok(())
    }

    fn set(&mut self, token: Address, owner: Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(&(token, owner));
        } else {
            self.balances.insert((token, owner), balance);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
