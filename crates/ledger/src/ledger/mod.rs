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

//! The [`Ledger`]: sessions, transactions and the entry points of the settlement core.
//!
//! Every mutating entry point runs inside a transaction. The outermost call checkpoints
//! the persistent state and the token bank, and restores both if the call fails or if
//! any nested call failed along the way. Sessions are opened with [`Ledger::lock`] and
//! must close with every token debt back at zero.

use std::rc::Rc;

use ahash::AHashMap;
use alloy_primitives::{Address, B256, Bytes};
use flashpool_math::{CheckedBoundedAmount, FeesPerLiquidity};

use crate::{
    config::LedgerConfig,
    error::LedgerError,
    extension::{CallPoints, Extension, Hook},
    pool::{Pool, PoolState, Position, Tick},
    session::{Session, SessionId},
    slots::{PoolId, PoolKey, PositionKey, SavedBalanceKey},
    token::{StandardToken, TokenBank, TokenBehavior},
};

mod payments;
mod pools;
mod scope;
mod state;

#[cfg(test)]
mod tests;

pub use self::state::SavedBalance;
use self::{
    scope::SessionScope,
    state::{LedgerState, Transient},
};

/// Converts an unsigned token amount into a debt delta.
fn to_debt(amount: u128, what: &'static str) -> Result<i128, LedgerError> {
    CheckedBoundedAmount::from_unsigned(amount)
        .map(|amount| amount.value())
        .ok_or(LedgerError::Overflow(what))
}

/// A full copy of the ledger's mutable state.
struct Checkpoint {
    state: LedgerState,
    tokens: TokenBank,
    transient: Transient,
}

/// A singleton settlement core for concentrated-liquidity pools.
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    state: LedgerState,
    tokens: TokenBank,
    transient: Transient,
    token_behaviors: AHashMap<Address, Rc<dyn TokenBehavior>>,
}

impl Ledger {
    /// Creates a new [`Ledger`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(config: LedgerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        log::info!(
            "Ledger {} ready (owner={}, withdrawal_fee_pips={})",
            config.address,
            config.owner,
            config.withdrawal_fee_pips
        );
        Ok(Self {
            config,
            state: LedgerState::default(),
            tokens: TokenBank::new(),
            transient: Transient::default(),
            token_behaviors: AHashMap::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The ledger's own account in the token model.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.config.address
    }

    /// Returns whether a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.transient.depth > 0
    }

    /// Sets how `token` responds to transfers and balance queries.
    pub fn set_token_behavior(&mut self, token: Address, behavior: Rc<dyn TokenBehavior>) {
        self.token_behaviors.insert(token, behavior);
    }

    /// Credits `amount` of `token` to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance would overflow.
    pub fn mint_tokens(
        &mut self,
        token: Address,
        owner: Address,
        amount: u128,
    ) -> anyhow::Result<()> {
        self.tokens.mint(token, owner, amount)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            tokens: self.tokens.clone(),
            transient: self.transient.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.state = checkpoint.state;
        self.tokens = checkpoint.tokens;
        self.transient = checkpoint.transient;
    }

    /// Runs `f` inside a transaction.
    ///
    /// Nested calls share the outermost transaction and poison it on failure. The
    /// outermost call rolls everything back if `f` failed or the transaction was
    /// poisoned, and always resets the transient state.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        if self.in_transaction() {
            self.transient.depth += 1;
            let result = f(self);
            self.transient.depth -= 1;
            if let Err(e) = &result {
                self.transient.poison(e);
            }
            return result;
        }

        let state = self.state.clone();
        let tokens = self.tokens.clone();
        self.transient.depth = 1;

        let result = f(self);
        let failure = self.transient.failure.take();
        self.transient = Transient::default();

        let result = match (result, failure) {
            (Ok(_), Some(error)) => Err(error),
            (result, _) => result,
        };
        if let Err(e) = &result {
            log::warn!("Rolled back {operation}: {e}");
            self.state = state;
            self.tokens = tokens;
        }
        result
    }

    /// Opens a new session held by `caller` and runs `callback` with it.
    ///
    /// The session's debts must all be zero when `callback` returns. The previously
    /// active session, if any, is restored on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, [`LedgerError::DebtsNotSettled`] if debts remain, or
    /// the first error raised anywhere in the transaction.
    pub fn lock<T>(
        &mut self,
        caller: Address,
        callback: impl FnOnce(&mut Self, Session) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.transact("lock", |ledger| {
            let depth = ledger.transient.depth;
            let session = ledger.transient.open_session(caller);
            let mut scope = SessionScope::enter(ledger, session);
            log::debug!("Opened session {session} at depth {depth}");

            let value = callback(&mut *scope, session)?;
            scope.transient.debts.require_settled(session.id)?;
            scope.transient.clear_payments(session.id);

            log::debug!("Closed session {session}");
            Ok(value)
        })
    }

    /// Hands the active session to the extension registered at `to` and runs its
    /// [`Extension::forwarded`] callback with `data`.
    ///
    /// The extension holds the session under the same id until the callback returns, so
    /// its debts settle together with the caller's.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the active session, `to` is not a
    /// registered extension, or the callback fails.
    pub fn forward(
        &mut self,
        caller: Address,
        to: Address,
        data: &[u8],
    ) -> Result<Bytes, LedgerError> {
        self.transact("forward", |ledger| {
            let session = ledger.require_holder(caller)?;
            let extension = ledger.extension(to)?;

            let forwarded = session.forwarded_to(to);
            let mut scope = SessionScope::enter(ledger, forwarded);
            log::debug!("Forwarded session {session} to {to}");

            let result = extension
                .forwarded(&mut scope, forwarded, caller, data)
                .map_err(|e| LedgerError::ExtensionCallFailed {
                    extension: to,
                    hook: Hook::Forwarded,
                    reason: format!("{e:#}"),
                });

            log::debug!("Returned session {session} from {to}");
            result
        })
    }

    fn require_holder(&self, caller: Address) -> Result<Session, LedgerError> {
        let session = self.transient.session.ok_or(LedgerError::NotLocked)?;
        if session.holder != caller {
            return Err(LedgerError::SessionNotHeld { caller, session });
        }
        Ok(session)
    }

    fn extension(&self, address: Address) -> Result<Rc<dyn Extension>, LedgerError> {
        if !self.state.call_points.contains_key(&address) {
            return Err(LedgerError::ExtensionNotRegistered(address));
        }
        self.state
            .extensions
            .get(&address)
            .cloned()
            .ok_or(LedgerError::ExtensionNotRegistered(address))
    }

    fn token_behavior(&self, token: Address) -> Rc<dyn TokenBehavior> {
        match self.token_behaviors.get(&token) {
            Some(behavior) => Rc::clone(behavior),
            None => Rc::new(StandardToken),
        }
    }

    fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool, LedgerError> {
        self.state
            .pools
            .get_mut(&id)
            .ok_or(LedgerError::PoolNotInitialized(id))
    }

    fn require_pool(&self, id: PoolId) -> Result<(), LedgerError> {
        if self.state.pools.contains_key(&id) {
            Ok(())
        } else {
            Err(LedgerError::PoolNotInitialized(id))
        }
    }

    // -- VIEWS -----------------------------------------------------------------------------------

    #[must_use]
    pub fn pool(&self, key: &PoolKey) -> Option<&Pool> {
        self.state.pools.get(&key.pool_id())
    }

    #[must_use]
    pub fn pool_state(&self, key: &PoolKey) -> Option<PoolState> {
        self.pool(key).map(Pool::state)
    }

    #[must_use]
    pub fn fees_per_liquidity(&self, key: &PoolKey) -> Option<FeesPerLiquidity> {
        self.pool(key).map(Pool::fees_per_liquidity)
    }

    /// The fees earned per unit of liquidity between `lower` and `upper`, as wrapping
    /// accumulator values.
    #[must_use]
    pub fn fees_per_liquidity_inside(
        &self,
        key: &PoolKey,
        lower: i32,
        upper: i32,
    ) -> Option<FeesPerLiquidity> {
        self.pool(key)
            .map(|pool| pool.fees_per_liquidity_inside(lower, upper))
    }

    #[must_use]
    pub fn tick(&self, key: &PoolKey, tick: i32) -> Option<Tick> {
        self.pool(key).and_then(|pool| pool.tick(tick)).copied()
    }

    #[must_use]
    pub fn position(
        &self,
        key: &PoolKey,
        owner: Address,
        position: &PositionKey,
    ) -> Option<Position> {
        self.pool(key)
            .and_then(|pool| pool.position(owner, position))
            .copied()
    }

    /// Searches the pool's tick bitmap from `from`, crossing at most `skip_ahead` empty
    /// words beyond the first.
    #[must_use]
    pub fn next_initialized_tick(
        &self,
        key: &PoolKey,
        from: i32,
        lte: bool,
        skip_ahead: u32,
    ) -> Option<(i32, bool)> {
        self.pool(key)
            .map(|pool| pool.ticks().next_initialized_tick(from, lte, skip_ahead))
    }

    #[must_use]
    pub fn saved_balance(
        &self,
        owner: Address,
        token0: Address,
        token1: Address,
        salt: B256,
    ) -> SavedBalance {
        self.state
            .saved_balances
            .get(&SavedBalanceKey::new(owner, token0, token1, salt))
            .copied()
            .unwrap_or_default()
    }

    /// Withdrawal fees accrued by the protocol in `token`.
    #[must_use]
    pub fn protocol_fees(&self, token: Address) -> u128 {
        self.state.protocol_fees.get(&token).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn debt(&self, session: SessionId, token: Address) -> i128 {
        self.transient.debts.debt(session, token)
    }

    #[must_use]
    pub fn nonzero_debt_count(&self, session: SessionId) -> u32 {
        self.transient.debts.nonzero_count(session)
    }

    #[must_use]
    pub const fn current_session(&self) -> Option<Session> {
        self.transient.session
    }

    #[must_use]
    pub fn token_balance(&self, token: Address, owner: Address) -> u128 {
        self.tokens.balance_of(token, owner)
    }

    #[must_use]
    pub fn call_points(&self, extension: Address) -> Option<CallPoints> {
        self.state.call_points.get(&extension).copied()
    }
}
