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

//! Fixture functions and test doubles for the ledger.

use std::{cell::RefCell, fmt::Debug, rc::Rc};

use alloy_primitives::{Address, B256, Bytes};
use rstest::fixture;

use crate::{
    config::LedgerConfig,
    error::LedgerError,
    extension::{CallPoints, Extension, Hook},
    ledger::Ledger,
    pool::{PositionUpdate, SwapOutcome, SwapParams},
    session::Session,
    slots::{PoolKey, PositionKey},
    token::{CallOutcome, TokenBehavior, encode_bool, encode_uint},
};

pub const TOKEN0: Address = Address::with_last_byte(0x10);
pub const TOKEN1: Address = Address::with_last_byte(0x20);
pub const ALICE: Address = Address::with_last_byte(0xa1);
pub const BOB: Address = Address::with_last_byte(0xb0);
pub const EXTENSION: Address = Address::with_last_byte(0xe0);

/// The balance of each token minted to [`ALICE`] and [`BOB`] by [`ledger`].
pub const FUNDING: u128 = 1_000_000_000_000_000_000_000_000;

// ---- Keys ----

#[fixture]
pub fn pool_key() -> PoolKey {
    PoolKey::new(TOKEN0, TOKEN1, 3_000, 10, Address::ZERO)
}

#[fixture]
pub fn extension_pool_key() -> PoolKey {
    PoolKey {
        extension: EXTENSION,
        ..pool_key()
    }
}

#[must_use]
pub const fn position_key(lower: i32, upper: i32) -> PositionKey {
    PositionKey::new(B256::ZERO, lower, upper)
}

// ---- Ledger ----

#[fixture]
pub fn ledger_config() -> LedgerConfig {
    LedgerConfig::default()
}

/// A ledger where [`ALICE`] and [`BOB`] each hold [`FUNDING`] of both tokens.
///
/// # Panics
///
/// Panics if the configuration is invalid.
#[fixture]
pub fn ledger(ledger_config: LedgerConfig) -> Ledger {
    let mut ledger = Ledger::new(ledger_config).unwrap();
    for owner in [ALICE, BOB] {
        for token in [TOKEN0, TOKEN1] {
            ledger.mint_tokens(token, owner, FUNDING).unwrap();
        }
    }
    ledger
}

// ---- Tokens ----

/// Returns nothing from transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReturnToken;

impl TokenBehavior for NoReturnToken {
    fn on_transfer(
        &self,
        _ledger: &mut Ledger,
        _token: Address,
        _from: Address,
        _to: Address,
        _amount: u128,
    ) -> CallOutcome {
        CallOutcome::Returned(Bytes::new())
    }
}

/// Returns a single non-zero byte from transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortReturnToken;

impl TokenBehavior for ShortReturnToken {
    fn on_transfer(
        &self,
        _ledger: &mut Ledger,
        _token: Address,
        _from: Address,
        _to: Address,
        _amount: u128,
    ) -> CallOutcome {
        CallOutcome::Returned(Bytes::from(vec![1u8]))
    }
}

/// Returns `false` from transfers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalseReturnToken;

impl TokenBehavior for FalseReturnToken {
    fn on_transfer(
        &self,
        _ledger: &mut Ledger,
        _token: Address,
        _from: Address,
        _to: Address,
        _amount: u128,
    ) -> CallOutcome {
        CallOutcome::Returned(encode_bool(false))
    }
}

/// Reverts every transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertingToken;

impl TokenBehavior for RevertingToken {
    fn on_transfer(
        &self,
        _ledger: &mut Ledger,
        _token: Address,
        _from: Address,
        _to: Address,
        _amount: u128,
    ) -> CallOutcome {
        CallOutcome::Reverted("paused".to_string())
    }
}

/// Answers balance queries with less than one word.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenBalanceToken;

impl TokenBehavior for BrokenBalanceToken {
    fn on_balance_of(&self, _token: Address, _owner: Address, balance: u128) -> CallOutcome {
        let word = encode_uint(balance);
        CallOutcome::Returned(Bytes::from(word[..31].to_vec()))
    }
}

pub type ReentryHandler = Rc<dyn Fn(&mut Ledger) -> Result<(), LedgerError>>;

/// Calls back into the ledger from inside every transfer and reverts if that call fails.
#[derive(Clone)]
pub struct ReentrantToken {
    pub on_transfer: ReentryHandler,
    pub calls: Rc<RefCell<u32>>,
}

impl ReentrantToken {
    #[must_use]
    pub fn new(on_transfer: ReentryHandler) -> Self {
        Self {
            on_transfer,
            calls: Rc::new(RefCell::new(0)),
        }
    }
}

impl Debug for ReentrantToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ReentrantToken))
            .field("calls", &self.calls.borrow())
            .finish_non_exhaustive()
    }
}

impl TokenBehavior for ReentrantToken {
    fn on_transfer(
        &self,
        ledger: &mut Ledger,
        _token: Address,
        _from: Address,
        _to: Address,
        _amount: u128,
    ) -> CallOutcome {
        *self.calls.borrow_mut() += 1;
        match (self.on_transfer)(ledger) {
            Ok(()) => CallOutcome::Returned(encode_bool(true)),
            Err(e) => CallOutcome::Reverted(e.to_string()),
        }
    }
}

// ---- Extensions ----

pub type ForwardHandler = Rc<dyn Fn(&mut Ledger, Session, &[u8]) -> Result<Bytes, LedgerError>>;

/// An extension that records every hook it receives.
///
/// A hook listed in `fail_on` mints one unit of [`TOKEN0`] to [`EXTENSION`] and then
/// fails, so tests can check that its effects are rolled back.
#[derive(Clone)]
pub struct TestExtension {
    pub call_points: CallPoints,
    pub calls: Rc<RefCell<Vec<Hook>>>,
    pub sessions: Rc<RefCell<Vec<Session>>>,
    pub fail_on: Option<Hook>,
    pub on_forward: Option<ForwardHandler>,
}

impl TestExtension {
    #[must_use]
    pub fn new(call_points: CallPoints) -> Self {
        Self {
            call_points,
            calls: Rc::new(RefCell::new(Vec::new())),
            sessions: Rc::new(RefCell::new(Vec::new())),
            fail_on: None,
            on_forward: None,
        }
    }

    #[must_use]
    pub fn failing_on(mut self, hook: Hook) -> Self {
        self.fail_on = Some(hook);
        self
    }

    #[must_use]
    pub fn forwarding(mut self, handler: ForwardHandler) -> Self {
        self.on_forward = Some(handler);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Hook> {
        self.calls.borrow().clone()
    }

    fn record(&self, ledger: &mut Ledger, hook: Hook) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(hook);
        if let Some(session) = ledger.current_session() {
            self.sessions.borrow_mut().push(session);
        }
        if self.fail_on == Some(hook) {
            ledger.mint_tokens(TOKEN0, EXTENSION, 1)?;
            anyhow::bail!("{hook} rejected");
        }
        Ok(())
    }
}

impl Debug for TestExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(TestExtension))
            .field("call_points", &self.call_points)
            .field("calls", &self.calls.borrow())
            .field("fail_on", &self.fail_on)
            .finish_non_exhaustive()
    }
}

impl Extension for TestExtension {
    fn call_points(&self) -> CallPoints {
        self.call_points
    }

    fn before_initialize_pool(
        &self,
        ledger: &mut Ledger,
        _caller: Address,
        _key: &PoolKey,
        _tick: i32,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::BeforeInitializePool)
    }

    fn after_initialize_pool(
        &self,
        ledger: &mut Ledger,
        _caller: Address,
        _key: &PoolKey,
        _tick: i32,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::AfterInitializePool)
    }

    fn before_swap(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _params: &SwapParams,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::BeforeSwap)
    }

    fn after_swap(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _params: &SwapParams,
        _outcome: &SwapOutcome,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::AfterSwap)
    }

    fn before_update_position(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _position: &PositionKey,
        _liquidity_delta: i128,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::BeforeUpdatePosition)
    }

    fn after_update_position(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _position: &PositionKey,
        _liquidity_delta: i128,
        _update: &PositionUpdate,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::AfterUpdatePosition)
    }

    fn before_collect_fees(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _position: &PositionKey,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::BeforeCollectFees)
    }

    fn after_collect_fees(
        &self,
        ledger: &mut Ledger,
        _session: Session,
        _key: &PoolKey,
        _position: &PositionKey,
        _amount0: u128,
        _amount1: u128,
    ) -> anyhow::Result<()> {
        self.record(ledger, Hook::AfterCollectFees)
    }

    fn forwarded(
        &self,
        ledger: &mut Ledger,
        session: Session,
        _origin: Address,
        data: &[u8],
    ) -> anyhow::Result<Bytes> {
        self.record(ledger, Hook::Forwarded)?;
        match &self.on_forward {
            Some(handler) => Ok(handler(ledger, session, data)?),
            None => Ok(Bytes::new()),
        }
    }
}
