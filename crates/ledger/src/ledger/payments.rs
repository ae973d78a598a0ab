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

use alloy_primitives::{Address, B256, U256};

use super::{Ledger, SavedBalance, to_debt};
use crate::{
    error::LedgerError,
    slots::SavedBalanceKey,
    token::{TransferStatus, decode_balance},
};

fn apply_saved_delta(amount: u128, delta: i128) -> Result<u128, LedgerError> {
    if delta >= 0 {
        amount
            .checked_add(delta.unsigned_abs())
            .ok_or(LedgerError::Overflow("saved balance"))
    } else {
        amount
            .checked_sub(delta.unsigned_abs())
            .ok_or(LedgerError::Underflow("saved balance"))
    }
}

impl Ledger {
    /// Sends `amount` of `token` from the ledger to `recipient`, owed by the session.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session, the debt overflows, or the
    /// transfer fails.
    pub fn withdraw(
        &mut self,
        caller: Address,
        token: Address,
        recipient: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.withdraw_many(caller, &[(token, recipient, amount)])
    }

    /// Sends several `(token, recipient, amount)` withdrawals, charging the session's
    /// debts in one update before any token moves.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session, a debt overflows, or any
    /// transfer fails.
    pub fn withdraw_many(
        &mut self,
        caller: Address,
        withdrawals: &[(Address, Address, u128)],
    ) -> Result<(), LedgerError> {
        self.transact("withdraw", |ledger| {
            let session = ledger.require_holder(caller)?;
            let deltas = withdrawals
                .iter()
                .map(|&(token, _, amount)| -> Result<(Address, i128), LedgerError> {
                    Ok((token, to_debt(amount, "withdrawal")?))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ledger.transient.debts.adjust_debts(session.id, &deltas)?;

            let from = ledger.address();
            for &(token, recipient, amount) in withdrawals {
                ledger.call_transfer(token, from, recipient, amount)?;
                log::debug!("Withdrew {amount} of {token} to {recipient} in session {session}");
            }
            Ok(())
        })
    }

    /// Records the ledger's current balance of `token` so that a later
    /// [`Ledger::complete_payment`] can credit whatever arrived in between.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session or the balance query fails.
    pub fn start_payment(&mut self, caller: Address, token: Address) -> Result<(), LedgerError> {
        self.transact("start_payment", |ledger| {
            let session = ledger.require_holder(caller)?;
            let balance = ledger.query_balance(token, ledger.address())?;
            ledger.transient.payments.insert((session.id, token), balance);
            Ok(())
        })
    }

    /// Credits the session with the increase of the ledger's `token` balance since
    /// [`Ledger::start_payment`] and returns it. A decrease credits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PaymentNotStarted`] without a prior snapshot, or an error if
    /// the balance query fails or the payment exceeds the debt bound.
    pub fn complete_payment(
        &mut self,
        caller: Address,
        token: Address,
    ) -> Result<u128, LedgerError> {
        self.transact("complete_payment", |ledger| {
            let session = ledger.require_holder(caller)?;
            let snapshot = ledger
                .transient
                .payments
                .remove(&(session.id, token))
                .ok_or(LedgerError::PaymentNotStarted(token))?;
            let balance = ledger.query_balance(token, ledger.address())?;

            let paid = balance.saturating_sub(snapshot);
            ledger.transient.absorb_payment(token, paid);
            let paid = u128::try_from(paid).map_err(|_| LedgerError::Overflow("payment"))?;
            ledger
                .transient
                .debts
                .adjust_debt(session.id, token, -to_debt(paid, "payment")?)?;

            log::debug!("Received payment of {paid} {token} in session {session}");
            Ok(paid)
        })
    }

    /// Pays `amount` of `token` from `caller` to the ledger and credits the session.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session or the transfer fails.
    pub fn pay(
        &mut self,
        caller: Address,
        token: Address,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        self.transact("pay", |ledger| {
            ledger.start_payment(caller, token)?;
            let to = ledger.address();
            ledger.transfer_token(token, caller, to, amount)?;
            ledger.complete_payment(caller, token)
        })
    }

    /// Moves `amount` of `token` from `from` to `to` as a direct token call made by `from`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransferFailed`] if the balance is insufficient or the token
    /// reports anything but success.
    pub fn transfer_token(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.transact("transfer_token", |ledger| {
            ledger.call_transfer(token, from, to, amount)
        })
    }

    /// Moves `delta0` and `delta1` between the session and the caller's saved balance for
    /// the sorted pair. Positive deltas save, negative deltas load. Only registered
    /// extensions may keep saved balances.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session or is not an extension, the
    /// tokens are unsorted, or a balance or debt leaves its bound.
    pub fn update_saved_balances(
        &mut self,
        caller: Address,
        token0: Address,
        token1: Address,
        salt: B256,
        delta0: i128,
        delta1: i128,
    ) -> Result<SavedBalance, LedgerError> {
        self.transact("update_saved_balances", |ledger| {
            let session = ledger.require_holder(caller)?;
            if !ledger.state.call_points.contains_key(&caller) {
                return Err(LedgerError::Unauthorized {
                    caller,
                    action: "update saved balances",
                });
            }
            if token0 >= token1 {
                return Err(LedgerError::InvalidPoolKey(format!(
                    "tokens must be sorted, was {token0} >= {token1}"
                )));
            }

            let key = SavedBalanceKey::new(caller, token0, token1, salt);
            let saved = ledger.saved_balance(caller, token0, token1, salt);
            let next = SavedBalance {
                amount0: apply_saved_delta(saved.amount0, delta0)?,
                amount1: apply_saved_delta(saved.amount1, delta1)?,
            };
            ledger
                .transient
                .debts
                .adjust_debts(session.id, &[(token0, delta0), (token1, delta1)])?;

            if next.is_empty() {
                ledger.state.saved_balances.remove(&key);
            } else {
                ledger.state.saved_balances.insert(key, next);
            }
            log::debug!("Saved balances of {caller} moved by ({delta0}, {delta1})");
            Ok(next)
        })
    }

    /// Sends accrued protocol fees to `recipient`. Only the configured owner may call this.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` is not the owner, `amount` exceeds the accrued fees,
    /// or the transfer fails.
    pub fn withdraw_protocol_fees(
        &mut self,
        caller: Address,
        recipient: Address,
        token: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.transact("withdraw_protocol_fees", |ledger| {
            if caller != ledger.config.owner {
                return Err(LedgerError::Unauthorized {
                    caller,
                    action: "withdraw protocol fees",
                });
            }
            let remaining = ledger
                .protocol_fees(token)
                .checked_sub(amount)
                .ok_or(LedgerError::Underflow("protocol fees"))?;
            if remaining == 0 {
                ledger.state.protocol_fees.remove(&token);
            } else {
                ledger.state.protocol_fees.insert(token, remaining);
            }

            let from = ledger.address();
            ledger.call_transfer(token, from, recipient, amount)?;
            log::info!("Withdrew {amount} of {token} in protocol fees to {recipient}");
            Ok(())
        })
    }

    /// Moves the bank balance, then lets the token decide what the call returned.
    fn call_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.tokens
            .transfer(token, from, to, amount)
            .map_err(|e| LedgerError::TransferFailed {
                token,
                reason: e.to_string(),
            })?;

        let behavior = self.token_behavior(token);
        let outcome = behavior.on_transfer(self, token, from, to, amount);
        match TransferStatus::classify(&outcome) {
            status if status.is_success() => Ok(()),
            status => Err(LedgerError::TransferFailed {
                token,
                reason: status.to_string(),
            }),
        }
    }

    fn query_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        let balance = self.tokens.balance_of(token, owner);
        let outcome = self
            .token_behavior(token)
            .on_balance_of(token, owner, balance);
        decode_balance(&outcome).map_err(|reason| LedgerError::BalanceQueryFailed { token, reason })
    }
}
