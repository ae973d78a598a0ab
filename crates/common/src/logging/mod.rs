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

//! The logging framework for flashpool systems.
//!
//! Library crates log through the [`log`] facade; binaries and test harnesses install the
//! [`Logger`](logger::Logger) implemented here to receive those records.

pub mod logger;
pub mod writer;

use std::{
    collections::HashMap,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use log::LevelFilter;
use ustr::Ustr;

use self::logger::{LogGuard, Logger, LoggerConfig};

/// Environment variable holding a logger spec, see [`LoggerConfig::from_spec`].
pub const LOG_ENV_VAR: &str = "FLASHPOOL_LOG";

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);
static LOGGING_BYPASSED: AtomicBool = AtomicBool::new(false);
static LOGGING_COLORED: AtomicBool = AtomicBool::new(true);

/// Returns whether the core logger is enabled.
pub fn logging_is_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::Relaxed)
}

/// Sets the logging system to bypass mode.
pub fn logging_set_bypass() {
    LOGGING_BYPASSED.store(true, Ordering::Relaxed);
}

/// Shuts down the logging system.
pub fn logging_shutdown() {
    log::logger().flush();
    LOGGING_INITIALIZED.store(false, Ordering::Relaxed);
}

/// Returns whether the core logger is using ANSI colors.
pub fn logging_is_colored() -> bool {
    LOGGING_COLORED.load(Ordering::Relaxed)
}

/// Initialize logging.
///
/// Logging can be configured to filter components and write up to a specific level only
/// by passing a configuration, or via the `FLASHPOOL_LOG` environment variable
/// (see [`LoggerConfig::from_env`]).
///
/// # Errors
///
/// Returns an error if the logging subsystem fails to initialize.
pub fn init_logging(config: LoggerConfig) -> anyhow::Result<LogGuard> {
    let colored = config.is_colored;
    let guard = Logger::init_with_config(config)?;
    LOGGING_INITIALIZED.store(true, Ordering::Relaxed);
    LOGGING_COLORED.store(colored, Ordering::Relaxed);
    Ok(guard)
}

/// Parses a string into a [`LevelFilter`], accepting `WARNING` as an alias of `WARN`.
///
/// # Errors
///
/// Returns an error if the string is not a valid level.
pub fn parse_level_filter_str(s: &str) -> anyhow::Result<LevelFilter> {
    let mut log_level_str = s.trim().to_uppercase();
    if log_level_str == "WARNING" {
        log_level_str = "WARN".to_string();
    }
    LevelFilter::from_str(&log_level_str)
        .map_err(|_| anyhow::anyhow!("Invalid `LevelFilter` string, was {log_level_str}"))
}

/// Parses component-specific log levels from a map of component names to level strings.
///
/// # Errors
///
/// Returns an error if any value is not a valid level.
pub fn parse_component_levels(
    original_map: Option<HashMap<String, String>>,
) -> anyhow::Result<HashMap<Ustr, LevelFilter>> {
    let mut new_map = HashMap::new();
    for (key, value) in original_map.unwrap_or_default() {
        new_map.insert(Ustr::from(&key), parse_level_filter_str(&value)?);
    }
    Ok(new_map)
}
