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

//! Pluggable hooks a pool can attach through its extension address.

use std::fmt::Debug;

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    ledger::Ledger,
    pool::{PositionUpdate, SwapOutcome, SwapParams},
    session::Session,
    slots::{PoolKey, PositionKey},
};

/// The callbacks the ledger can make into an extension.
#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum Hook {
    BeforeInitializePool,
    AfterInitializePool,
    BeforeSwap,
    AfterSwap,
    BeforeUpdatePosition,
    AfterUpdatePosition,
    BeforeCollectFees,
    AfterCollectFees,
    /// A session forwarded to the extension with [`Ledger::forward`].
    Forwarded,
}

/// The hooks an extension wants to receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallPoints {
    pub before_initialize_pool: bool,
    pub after_initialize_pool: bool,
    pub before_swap: bool,
    pub after_swap: bool,
    pub before_update_position: bool,
    pub after_update_position: bool,
    pub before_collect_fees: bool,
    pub after_collect_fees: bool,
}

impl CallPoints {
    pub const NONE: Self = Self {
        before_initialize_pool: false,
        after_initialize_pool: false,
        before_swap: false,
        after_swap: false,
        before_update_position: false,
        after_update_position: false,
        before_collect_fees: false,
        after_collect_fees: false,
    };

    pub const ALL: Self = Self {
        before_initialize_pool: true,
        after_initialize_pool: true,
        before_swap: true,
        after_swap: true,
        before_update_position: true,
        after_update_position: true,
        before_collect_fees: true,
        after_collect_fees: true,
    };

    /// Returns whether `hook` should be called. Forwarding is never gated.
    #[must_use]
    pub const fn is_enabled(&self, hook: Hook) -> bool {
        match hook {
            Hook::BeforeInitializePool => self.before_initialize_pool,
            Hook::AfterInitializePool => self.after_initialize_pool,
            Hook::BeforeSwap => self.before_swap,
            Hook::AfterSwap => self.after_swap,
            Hook::BeforeUpdatePosition => self.before_update_position,
            Hook::AfterUpdatePosition => self.after_update_position,
            Hook::BeforeCollectFees => self.before_collect_fees,
            Hook::AfterCollectFees => self.after_collect_fees,
            Hook::Forwarded => true,
        }
    }
}

/// External code attached to pools.
///
/// Every hook defaults to a no-op, so an extension only implements the ones it enables in
/// [`Extension::call_points`]. Hooks receive the ledger mutably and may re-enter it; an error
/// aborts the operation that triggered the hook.
#[allow(unused_variables)]
pub trait Extension: Debug {
    /// The hooks this extension wants, read once at registration.
    fn call_points(&self) -> CallPoints;

    /// Called before a pool using this extension is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the initialization.
    fn before_initialize_pool(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        key: &PoolKey,
        tick: i32,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after a pool using this extension is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the initialization.
    fn after_initialize_pool(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        key: &PoolKey,
        tick: i32,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before a swap.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the swap.
    fn before_swap(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        params: &SwapParams,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after a swap with its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the swap.
    fn after_swap(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        params: &SwapParams,
        outcome: &SwapOutcome,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before a position's liquidity changes.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the update.
    fn before_update_position(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        position: &PositionKey,
        liquidity_delta: i128,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after a position's liquidity changed.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the update.
    fn after_update_position(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        position: &PositionKey,
        liquidity_delta: i128,
        update: &PositionUpdate,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before fees are collected from a position.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the collection, unless collect-fees hooks are isolated.
    fn before_collect_fees(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        position: &PositionKey,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after fees were collected from a position.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the collection, unless collect-fees hooks are isolated.
    fn after_collect_fees(
        &self,
        ledger: &mut Ledger,
        session: Session,
        key: &PoolKey,
        position: &PositionKey,
        amount0: u128,
        amount1: u128,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a session holder forwards the session to this extension.
    ///
    /// `session` is the forwarded session, held by the extension; `origin` is the holder
    /// that forwarded it.
    ///
    /// # Errors
    ///
    /// The default implementation rejects forwarding.
    fn forwarded(
        &self,
        ledger: &mut Ledger,
        session: Session,
        origin: Address,
        data: &[u8],
    ) -> anyhow::Result<Bytes> {
        anyhow::bail!("Extension does not accept forwarded sessions")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
