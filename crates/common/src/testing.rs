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

//! Common test related helper functions.

use std::collections::HashMap;

use log::LevelFilter;

use crate::logging::{
    init_logging,
    logger::{LogGuard, LoggerConfig},
};

/// Initializes logging for a test binary, writing up to `stdout_level` (default `Trace`).
///
/// # Errors
///
/// Returns an error if a logger has already been installed for this process.
pub fn init_logger_for_testing(stdout_level: Option<LevelFilter>) -> anyhow::Result<LogGuard> {
    let config = LoggerConfig::new(
        stdout_level.unwrap_or(LevelFilter::Trace),
        HashMap::new(),
        false,
        false,
    );
    init_logging(config)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
