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

use ahash::AHashMap;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    debt::DebtLedger,
    error::LedgerError,
    extension::{CallPoints, Extension},
    pool::Pool,
    session::{Session, SessionId},
    slots::{PoolId, SavedBalanceKey},
};

/// Amounts an owner keeps for a sorted token pair outside of any session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedBalance {
    pub amount0: u128,
    pub amount1: u128,
}

impl SavedBalance {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount0 == 0 && self.amount1 == 0
    }
}

/// State that outlives transactions.
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerState {
    pub pools: AHashMap<PoolId, Pool>,
    pub call_points: AHashMap<Address, CallPoints>,
    pub extensions: AHashMap<Address, Rc<dyn Extension>>,
    pub saved_balances: AHashMap<SavedBalanceKey, SavedBalance>,
    pub protocol_fees: AHashMap<Address, u128>,
}

/// Scratch state of the open transaction, reset when the outermost call returns.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transient {
    /// Nesting depth of entry-point calls, zero outside a transaction.
    pub depth: u32,
    pub session: Option<Session>,
    pub next_session_id: u64,
    pub debts: DebtLedger,
    /// Balance snapshots of payments in progress.
    pub payments: AHashMap<(SessionId, Address), U256>,
    /// The first error raised inside the transaction.
    pub failure: Option<LedgerError>,
}

impl Transient {
    pub fn open_session(&mut self, holder: Address) -> Session {
        self.next_session_id += 1;
        Session::new(SessionId::new(self.next_session_id), holder)
    }

    pub fn poison(&mut self, error: &LedgerError) {
        if self.failure.is_none() {
            self.failure = Some(error.clone());
        }
    }

    /// Raises every pending snapshot of `token` by `amount`, so a balance increase
    /// credited once cannot be counted again by another payment in progress.
    pub fn absorb_payment(&mut self, token: Address, amount: U256) {
        for ((_, pending), snapshot) in &mut self.payments {
            if *pending == token {
                *snapshot = snapshot.saturating_add(amount);
            }
        }
    }

    pub fn clear_payments(&mut self, session: SessionId) {
        self.payments.retain(|(id, _), _| *id != session);
    }
}
