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

use alloy_primitives::{Address, U160};
use flashpool_math::MathError;
use thiserror::Error;

use crate::{
    extension::Hook,
    session::{Session, SessionId},
    slots::PoolId,
};

/// Errors raised by the ledger entry points.
///
/// Every error aborts the enclosing top-level transaction, leaving the ledger exactly
/// as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("No session is active")]
    NotLocked,
    #[error("Caller {caller} does not hold session {session}")]
    SessionNotHeld { caller: Address, session: Session },
    #[error("Session {session} closed with {nonzero} unsettled debts")]
    DebtsNotSettled { session: SessionId, nonzero: u32 },
    #[error("Debt for token {token} in session {session} exceeds the signed 128-bit bound")]
    DebtOverflow { session: SessionId, token: Address },
    #[error("Overflow in {0}")]
    Overflow(&'static str),
    #[error("Underflow in {0}")]
    Underflow(&'static str),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("Invalid pool key: {0}")]
    InvalidPoolKey(String),
    #[error("Invalid price limit {limit} for current price {current}")]
    InvalidPriceLimit { limit: U160, current: U160 },
    #[error("Pool {0} is not initialized")]
    PoolNotInitialized(PoolId),
    #[error("Pool {0} is already initialized")]
    PoolAlreadyInitialized(PoolId),
    #[error("Transfer of token {token} failed: {reason}")]
    TransferFailed { token: Address, reason: String },
    #[error("Balance query of token {token} failed: {reason}")]
    BalanceQueryFailed { token: Address, reason: String },
    #[error("No payment in progress for token {0}")]
    PaymentNotStarted(Address),
    #[error("Extension {extension} failed in {hook}: {reason}")]
    ExtensionCallFailed {
        extension: Address,
        hook: Hook,
        reason: String,
    },
    #[error("Extension {0} is not registered")]
    ExtensionNotRegistered(Address),
    #[error("Extension {0} is already registered")]
    ExtensionAlreadyRegistered(Address),
    #[error("Caller {caller} is not authorized to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },
    #[error(transparent)]
    Math(MathError),
}

impl From<MathError> for LedgerError {
    fn from(error: MathError) -> Self {
        match error {
            MathError::Overflow(what) => Self::Overflow(what),
            MathError::Underflow(what) => Self::Underflow(what),
            other => Self::Math(other),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
