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

//! Flash-accounting settlement ledger with a concentrated-liquidity pool engine.
//!
//! One [`Ledger`] holds the tokens of every pool. Callers open a session with
//! [`Ledger::lock`], perform any number of swaps, position updates, fee collections,
//! withdrawals and payments, and the session only closes once every per-token debt
//! it accumulated has been driven back to exactly zero.
//!
//! The crate is organized leaves first:
//!
//! - [`slots`]: deterministic identifiers for pools, positions and saved balances.
//! - [`debt`]: per-session signed debts with an incrementally maintained non-zero counter.
//! - [`session`]: the `{ id, holder }` pair representing exclusive write access.
//! - [`pool`]: pool state, ticks, the tick bitmap, positions, swaps and position updates.
//! - [`extension`]: the hook interface pools may attach.
//! - [`token`]: the abstract token model and transfer-outcome classification.
//! - [`ledger`]: the entry points tying everything together.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod debt;
pub mod error;
pub mod extension;
pub mod ledger;
pub mod pool;
pub mod session;
pub mod slots;
pub mod token;

#[cfg(any(test, feature = "stubs"))]
pub mod stubs;

pub use crate::{
    config::LedgerConfig,
    error::LedgerError,
    extension::{CallPoints, Extension, Hook},
    ledger::Ledger,
    pool::{BalanceUpdate, PoolState},
    session::{Session, SessionId},
    slots::{PoolId, PoolKey, PositionId, PositionKey, SavedBalanceKey},
    token::{CallOutcome, TokenBehavior, TransferStatus},
};
