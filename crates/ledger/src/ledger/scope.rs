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

use std::ops::{Deref, DerefMut};

use crate::{ledger::Ledger, session::Session};

/// Installs a session for its lifetime and restores the previous one when dropped,
/// on every exit path.
pub(crate) struct SessionScope<'a> {
    ledger: &'a mut Ledger,
    previous: Option<Session>,
}

impl<'a> SessionScope<'a> {
    pub fn enter(ledger: &'a mut Ledger, session: Session) -> Self {
        let previous = ledger.transient.session.replace(session);
        Self { ledger, previous }
    }
}

impl Deref for SessionScope<'_> {
    type Target = Ledger;

    fn deref(&self) -> &Self::Target {
        self.ledger
    }
}

impl DerefMut for SessionScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ledger
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        self.ledger.transient.session = self.previous;
    }
}
