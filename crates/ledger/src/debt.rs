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

//! Per-session, per-token signed debts.
//!
//! A positive debt is owed *to* the ledger by the session, a negative one is owed *by*
//! the ledger. Every session also carries a counter of tokens whose debt is non-zero,
//! so closing a session never has to enumerate tokens.

use ahash::AHashMap;
use alloy_primitives::Address;
use flashpool_math::CheckedBoundedAmount;

use crate::{error::LedgerError, session::SessionId};

/// Debts of every open session in the current transaction.
#[derive(Debug, Clone, Default)]
pub struct DebtLedger {
    debts: AHashMap<(SessionId, Address), CheckedBoundedAmount>,
    nonzero: AHashMap<SessionId, u32>,
}

impl DebtLedger {
    /// Creates a new empty [`DebtLedger`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the debt of `session` in `token`.
    #[must_use]
    pub fn debt(&self, session: SessionId, token: Address) -> i128 {
        self.debts
            .get(&(session, token))
            .map_or(0, CheckedBoundedAmount::value)
    }

    /// Returns the number of tokens with a non-zero debt in `session`.
    #[must_use]
    pub fn nonzero_count(&self, session: SessionId) -> u32 {
        self.nonzero.get(&session).copied().unwrap_or(0)
    }

    /// Adds `delta` to the debt of `session` in `token`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DebtOverflow`] if the debt would leave the signed 128-bit range.
    pub fn adjust_debt(
        &mut self,
        session: SessionId,
        token: Address,
        delta: i128,
    ) -> Result<(), LedgerError> {
        self.adjust_debts(session, &[(token, delta)])
    }

    /// Applies several debt changes to `session` as one update.
    ///
    /// All new values are computed before anything is written, and the non-zero counter
    /// is changed once by the net number of zero crossings. Repeated tokens are summed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DebtOverflow`] if any resulting debt would leave the signed
    /// 128-bit range; nothing is written in that case.
    pub fn adjust_debts(
        &mut self,
        session: SessionId,
        deltas: &[(Address, i128)],
    ) -> Result<(), LedgerError> {
        // (token, before, after)
        let mut staged: Vec<(Address, CheckedBoundedAmount, CheckedBoundedAmount)> =
            Vec::with_capacity(deltas.len());

        for &(token, delta) in deltas {
            if delta == 0 {
                continue;
            }
            let position = staged.iter().position(|(staged_token, _, _)| *staged_token == token);
            let current = match position {
                Some(index) => staged[index].2,
                None => self
                    .debts
                    .get(&(session, token))
                    .copied()
                    .unwrap_or(CheckedBoundedAmount::ZERO),
            };
            let next = current
                .checked_add(delta)
                .ok_or(LedgerError::DebtOverflow { session, token })?;
            match position {
                Some(index) => staged[index].2 = next,
                None => staged.push((token, current, next)),
            }
        }

        let mut crossings: i64 = 0;
        for (token, before, after) in &staged {
            match (before.is_zero(), after.is_zero()) {
                (true, false) => crossings += 1,
                (false, true) => crossings -= 1,
                _ => {}
            }
            if after.is_zero() {
                self.debts.remove(&(session, *token));
            } else {
                self.debts.insert((session, *token), *after);
            }
        }

        if crossings != 0 {
            let count = i64::from(self.nonzero_count(session)) + crossings;
            match u32::try_from(count) {
                Ok(0) => {
                    self.nonzero.remove(&session);
                }
                Ok(count) => {
                    self.nonzero.insert(session, count);
                }
                Err(_) => return Err(LedgerError::Underflow("nonzero debt count")),
            }
        }
        Ok(())
    }

    /// Checks that `session` owes nothing and is owed nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DebtsNotSettled`] if any token debt of the session is non-zero.
    pub fn require_settled(&self, session: SessionId) -> Result<(), LedgerError> {
        match self.nonzero_count(session) {
            0 => Ok(()),
            nonzero => Err(LedgerError::DebtsNotSettled { session, nonzero }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
