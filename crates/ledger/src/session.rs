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

//! Session identity: who currently holds exclusive write access to the ledger.

use std::fmt::Display;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Identifier of one `lock` session, unique within a top-level transaction.
///
/// Debts are keyed by this identifier, never by the holder, so a forwarded callee
/// mutates the same books as the session that forwarded to it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new [`SessionId`] instance.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The active session: its identifier and the account currently allowed to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub holder: Address,
}

impl Session {
    /// Creates a new [`Session`] instance.
    #[must_use]
    pub const fn new(id: SessionId, holder: Address) -> Self {
        Self { id, holder }
    }

    /// Returns the same session held by `holder`.
    #[must_use]
    pub const fn forwarded_to(self, holder: Address) -> Self {
        Self {
            id: self.id,
            holder,
        }
    }
}

impl Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(holder={})", self.id, self.holder)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_forwarded_keeps_id() {
        let session = Session::new(SessionId::new(7), Address::with_last_byte(1));
        let forwarded = session.forwarded_to(Address::with_last_byte(2));

        assert_eq!(forwarded.id, session.id);
        assert_eq!(forwarded.holder, Address::with_last_byte(2));
    }

    #[rstest]
    fn test_display() {
        let session = Session::new(SessionId::new(7), Address::ZERO);
        assert_eq!(
            session.to_string(),
            "7(holder=0x0000000000000000000000000000000000000000)"
        );
    }
}
