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

use std::rc::Rc;

use alloy_primitives::{Address, U160};

use super::{Ledger, to_debt};
use crate::{
    error::LedgerError,
    extension::{CallPoints, Extension, Hook},
    pool::{BalanceUpdate, Pool, SnapshotUpdate, SwapParams},
    slots::{PoolId, PoolKey, PositionKey},
};

impl Ledger {
    /// Registers `extension` at `address`, reading its call points once.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ExtensionAlreadyRegistered`] on a second registration.
    pub fn register_extension(
        &mut self,
        address: Address,
        extension: Rc<dyn Extension>,
    ) -> Result<CallPoints, LedgerError> {
        self.transact("register_extension", |ledger| {
            if address.is_zero() {
                return Err(LedgerError::Unauthorized {
                    caller: address,
                    action: "register as an extension",
                });
            }
            if ledger.state.call_points.contains_key(&address) {
                return Err(LedgerError::ExtensionAlreadyRegistered(address));
            }

            let call_points = extension.call_points();
            ledger.state.call_points.insert(address, call_points);
            ledger.state.extensions.insert(address, extension);
            log::info!("Registered extension {address} with {call_points:?}");
            Ok(call_points)
        })
    }

    /// Initializes the pool for `key` at `tick` and returns its starting sqrt price.
    ///
    /// No session is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or tick is invalid, the key names an unregistered
    /// extension, the pool already exists, or a hook fails.
    pub fn initialize_pool(
        &mut self,
        caller: Address,
        key: &PoolKey,
        tick: i32,
    ) -> Result<U160, LedgerError> {
        self.transact("initialize_pool", |ledger| {
            key.validate(ledger.config.max_tick_spacing)?;
            if key.has_extension() && !ledger.state.call_points.contains_key(&key.extension) {
                return Err(LedgerError::ExtensionNotRegistered(key.extension));
            }
            let pool = Pool::new(*key, tick)?;
            let pool_id = pool.id();
            ledger.require_uninitialized(pool_id)?;

            ledger.call_hook(caller, key, Hook::BeforeInitializePool, |extension, ledger| {
                extension.before_initialize_pool(ledger, caller, key, tick)
            })?;
            // The hook may have initialized the pool itself
            ledger.require_uninitialized(pool_id)?;

            let sqrt_ratio = pool.state().sqrt_ratio;
            ledger.state.pools.insert(pool_id, pool);
            log::info!("Initialized pool {pool_id} at tick {tick} (sqrt_ratio={sqrt_ratio})");

            ledger.call_hook(caller, key, Hook::AfterInitializePool, |extension, ledger| {
                extension.after_initialize_pool(ledger, caller, key, tick)
            })?;
            Ok(sqrt_ratio)
        })
    }

    /// Swaps against the pool for `key` and charges the balance update to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session, the pool does not exist,
    /// the price limit is invalid, a hook fails, or a debt overflows.
    pub fn swap(
        &mut self,
        caller: Address,
        key: &PoolKey,
        params: SwapParams,
    ) -> Result<BalanceUpdate, LedgerError> {
        self.transact("swap", |ledger| {
            let session = ledger.require_holder(caller)?;
            let pool_id = key.pool_id();
            ledger.require_pool(pool_id)?;

            ledger.call_hook(caller, key, Hook::BeforeSwap, |extension, ledger| {
                extension.before_swap(ledger, session, key, &params)
            })?;

            let outcome = ledger.pool_mut(pool_id)?.swap(&params)?;
            let update = outcome.balance_update;
            ledger.transient.debts.adjust_debts(
                session.id,
                &[(key.token0, update.delta0), (key.token1, update.delta1)],
            )?;
            log::debug!(
                "Swapped in pool {pool_id}: delta0={}, delta1={}, tick={}, crossed={}",
                update.delta0,
                update.delta1,
                outcome.state_after.tick,
                outcome.ticks_crossed
            );

            ledger.call_hook(caller, key, Hook::AfterSwap, |extension, ledger| {
                extension.after_swap(ledger, session, key, &params, &outcome)
            })?;
            Ok(update)
        })
    }

    /// Changes the liquidity of `caller`'s position in the pool for `key`.
    ///
    /// Deposits are owed by the session; withdrawals and any fees realized by the update
    /// are owed to it.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session, the pool does not exist,
    /// the range is invalid, liquidity or an amount leaves its bound, or a hook fails.
    pub fn update_position(
        &mut self,
        caller: Address,
        key: &PoolKey,
        position: &PositionKey,
        liquidity_delta: i128,
    ) -> Result<BalanceUpdate, LedgerError> {
        self.transact("update_position", |ledger| {
            let session = ledger.require_holder(caller)?;
            let pool_id = key.pool_id();
            ledger.require_pool(pool_id)?;

            ledger.call_hook(caller, key, Hook::BeforeUpdatePosition, |extension, ledger| {
                extension.before_update_position(ledger, session, key, position, liquidity_delta)
            })?;

            let withdrawal_fee_pips = ledger.config.withdrawal_fee_pips;
            let update = ledger.pool_mut(pool_id)?.update_position(
                caller,
                position,
                liquidity_delta,
                withdrawal_fee_pips,
            )?;

            if let SnapshotUpdate::Realized { fees0, fees1 } = update.snapshot {
                log::warn!(
                    "Realized fees ({fees0}, {fees1}) of position [{}, {}] in pool {pool_id}",
                    position.lower,
                    position.upper
                );
            }
            let (protocol0, protocol1) = update.protocol_fees;
            ledger.accrue_protocol_fees(key.token0, protocol0)?;
            ledger.accrue_protocol_fees(key.token1, protocol1)?;

            let balance = update.balance_update;
            ledger.transient.debts.adjust_debts(
                session.id,
                &[(key.token0, balance.delta0), (key.token1, balance.delta1)],
            )?;
            log::debug!(
                "Updated position [{}, {}] of {caller} in pool {pool_id}: delta0={}, delta1={}",
                position.lower,
                position.upper,
                balance.delta0,
                balance.delta1
            );

            ledger.call_hook(caller, key, Hook::AfterUpdatePosition, |extension, ledger| {
                extension.after_update_position(
                    ledger,
                    session,
                    key,
                    position,
                    liquidity_delta,
                    &update,
                )
            })?;
            Ok(balance)
        })
    }

    /// Collects the fees accrued by `caller`'s position and credits them to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session, the pool does not exist,
    /// or a hook fails while collect-fee hooks are not isolated.
    pub fn collect_fees(
        &mut self,
        caller: Address,
        key: &PoolKey,
        position: &PositionKey,
    ) -> Result<(u128, u128), LedgerError> {
        self.transact("collect_fees", |ledger| {
            let session = ledger.require_holder(caller)?;
            let pool_id = key.pool_id();
            ledger.require_pool(pool_id)?;

            ledger.call_collect_hook(caller, key, Hook::BeforeCollectFees, |extension, ledger| {
                extension.before_collect_fees(ledger, session, key, position)
            })?;

            let (amount0, amount1) = ledger.pool_mut(pool_id)?.collect_fees(caller, position)?;
            ledger.transient.debts.adjust_debts(
                session.id,
                &[
                    (key.token0, -to_debt(amount0, "collected fees")?),
                    (key.token1, -to_debt(amount1, "collected fees")?),
                ],
            )?;
            log::debug!(
                "Collected fees ({amount0}, {amount1}) of position [{}, {}] in pool {pool_id}",
                position.lower,
                position.upper
            );

            ledger.call_collect_hook(caller, key, Hook::AfterCollectFees, |extension, ledger| {
                extension.after_collect_fees(ledger, session, key, position, amount0, amount1)
            })?;
            Ok((amount0, amount1))
        })
    }

    /// Donates `amount0` and `amount1` to the pool's in-range liquidity, paid by the
    /// session. Only the pool's extension may call this.
    ///
    /// # Errors
    ///
    /// Returns an error if `caller` does not hold the session or is not the pool's
    /// extension, the pool does not exist, or a debt overflows.
    pub fn accumulate_as_fees(
        &mut self,
        caller: Address,
        key: &PoolKey,
        amount0: u128,
        amount1: u128,
    ) -> Result<(), LedgerError> {
        self.transact("accumulate_as_fees", |ledger| {
            let session = ledger.require_holder(caller)?;
            if !key.has_extension() || caller != key.extension {
                return Err(LedgerError::Unauthorized {
                    caller,
                    action: "accumulate fees",
                });
            }

            let pool_id = key.pool_id();
            ledger.pool_mut(pool_id)?.accumulate_as_fees(amount0, amount1)?;
            ledger.transient.debts.adjust_debts(
                session.id,
                &[
                    (key.token0, to_debt(amount0, "accumulated fees")?),
                    (key.token1, to_debt(amount1, "accumulated fees")?),
                ],
            )?;
            log::debug!("Accumulated fees ({amount0}, {amount1}) in pool {pool_id}");
            Ok(())
        })
    }

    fn require_uninitialized(&self, id: PoolId) -> Result<(), LedgerError> {
        if self.state.pools.contains_key(&id) {
            Err(LedgerError::PoolAlreadyInitialized(id))
        } else {
            Ok(())
        }
    }

    fn accrue_protocol_fees(&mut self, token: Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let accrued = self.protocol_fees(token);
        let next = accrued
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("protocol fees"))?;
        self.state.protocol_fees.insert(token, next);
        Ok(())
    }

    /// Calls `hook` on the pool's extension unless the pool has none, the caller is the
    /// extension itself, or the extension did not ask for the hook.
    fn call_hook(
        &mut self,
        caller: Address,
        key: &PoolKey,
        hook: Hook,
        call: impl FnOnce(&dyn Extension, &mut Self) -> anyhow::Result<()>,
    ) -> Result<(), LedgerError> {
        if !key.has_extension() || caller == key.extension {
            return Ok(());
        }
        let enabled = self
            .state
            .call_points
            .get(&key.extension)
            .is_some_and(|points| points.is_enabled(hook));
        if !enabled {
            return Ok(());
        }

        let extension = self.extension(key.extension)?;
        if self.config.debug {
            log::debug!("Calling {hook} on {}", key.extension);
        }
        call(&*extension, self).map_err(|e| LedgerError::ExtensionCallFailed {
            extension: key.extension,
            hook,
            reason: format!("{e:#}"),
        })
    }

    /// Calls a collect-fees hook. When isolation is enabled a failing hook is logged and
    /// its effects are rolled back, including the failure it recorded.
    fn call_collect_hook(
        &mut self,
        caller: Address,
        key: &PoolKey,
        hook: Hook,
        call: impl FnOnce(&dyn Extension, &mut Self) -> anyhow::Result<()>,
    ) -> Result<(), LedgerError> {
        if !self.config.isolate_fee_collection_hooks {
            return self.call_hook(caller, key, hook, call);
        }

        let checkpoint = self.checkpoint();
        if let Err(e) = self.call_hook(caller, key, hook, call) {
            log::warn!("Ignoring failed {hook} of {}: {e}", key.extension);
            // Sessions opened by the hook stay used
            let next_session_id = self.transient.next_session_id;
            self.restore(checkpoint);
            self.transient.next_session_id = next_session_id;
        }
        Ok(())
    }
}
