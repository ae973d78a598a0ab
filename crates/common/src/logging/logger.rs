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

use std::{
    collections::HashMap,
    env,
    fmt::Display,
    str::FromStr,
    sync::{atomic::Ordering, mpsc::SendError},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{Level, LevelFilter, Log, STATIC_MAX_LEVEL, set_boxed_logger, set_max_level};
use serde::{Deserialize, Serialize};
use ustr::Ustr;

use super::{LOG_ENV_VAR, LOGGING_BYPASSED};
use crate::logging::writer::{LogWriter, StderrWriter, StdoutWriter};

const LOGGING: &str = "logging";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Maximum log level to write to stdout.
    pub stdout_level: LevelFilter,
    /// Per-component log levels, keyed by module path prefix.
    component_level: HashMap<Ustr, LevelFilter>,
    /// If logger is using ANSI color codes.
    pub is_colored: bool,
    /// If the configuration should be printed to stdout at initialization.
    pub print_config: bool,
}

impl Default for LoggerConfig {
    /// Creates a new default [`LoggerConfig`] instance.
    fn default() -> Self {
        Self {
            stdout_level: LevelFilter::Info,
            component_level: HashMap::new(),
            is_colored: false,
            print_config: false,
        }
    }
}

impl LoggerConfig {
    /// Creates a new [`LoggerConfig`] instance.
    #[must_use]
    pub const fn new(
        stdout_level: LevelFilter,
        component_level: HashMap<Ustr, LevelFilter>,
        is_colored: bool,
        print_config: bool,
    ) -> Self {
        Self {
            stdout_level,
            component_level,
            is_colored,
            print_config,
        }
    }

    /// Parses a `;` separated spec such as `stdout=debug;is_colored;flashpool_ledger::pool=trace`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pair is malformed or a level is invalid.
    pub fn from_spec(spec: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        for kv in spec.split(';') {
            let kv = kv.trim();
            if kv.is_empty() {
                continue;
            }
            let kv_lower = kv.to_lowercase();
            if kv_lower == "is_colored" {
                config.is_colored = true;
            } else if kv_lower == "print_config" {
                config.print_config = true;
            } else {
                let Some((k, v)) = kv.split_once('=') else {
                    anyhow::bail!("Invalid spec pair: {kv}");
                };
                let k = k.trim();
                let v = v.trim();
                let lvl = LevelFilter::from_str(v)
                    .map_err(|_| anyhow::anyhow!("Invalid log level: {v}"))?;
                if k.eq_ignore_ascii_case("stdout") {
                    config.stdout_level = lvl;
                } else {
                    config.component_level.insert(Ustr::from(k), lvl);
                }
            }
        }
        Ok(config)
    }

    /// Retrieves the logger configuration from the "`FLASHPOOL_LOG`" environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let spec = env::var(LOG_ENV_VAR)?;
        Self::from_spec(&spec)
    }

    /// Returns the level configured for the most specific component prefix of `target`.
    #[must_use]
    pub fn component_level(&self, target: &str) -> Option<LevelFilter> {
        self.component_level
            .iter()
            .filter(|(component, _)| target.starts_with(component.as_str()))
            .max_by_key(|(component, _)| component.len())
            .map(|(_, level)| *level)
    }
}

/// A logger which hands records over an MPSC channel to a dedicated writer thread.
#[derive(Debug)]
pub struct Logger {
    /// Configuration for logging levels and behavior.
    pub config: LoggerConfig,
    tx: std::sync::mpsc::Sender<LogEvent>,
}

/// Represents a type of log event.
#[derive(Debug)]
pub enum LogEvent {
    /// A log line event.
    Log(LogLine),
    /// A command to flush all logger buffers.
    Flush,
}

/// Represents a log event which includes a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogLine {
    /// UNIX timestamp (nanoseconds) when the record was emitted.
    pub timestamp: u64,
    /// The log level for the event.
    pub level: Level,
    /// The component (module path) the log event originated from.
    pub component: Ustr,
    /// The log message content.
    pub message: String,
}

impl Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.component, self.message)
    }
}

impl LogLine {
    /// Returns the plain line written by the writers.
    #[must_use]
    pub fn to_plain(&self) -> String {
        format!("{} {self}\n", self.timestamp)
    }

    /// Returns the line wrapped in ANSI color codes for its level.
    #[must_use]
    pub fn to_colored(&self) -> String {
        let color = match self.level {
            Level::Error => "\x1b[1;31m",
            Level::Warn => "\x1b[1;33m",
            Level::Info => "",
            Level::Debug | Level::Trace => "\x1b[2m",
        };
        format!("\x1b[1m{}\x1b[0m {color}{self}\x1b[0m\n", self.timestamp)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if LOGGING_BYPASSED.load(Ordering::Relaxed) {
            return false;
        }
        match self.config.component_level(metadata.target()) {
            Some(level) => metadata.level() <= level,
            None => {
                metadata.level() == Level::Error || metadata.level() <= self.config.stdout_level
            }
        }
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos() as u64);
            let line = LogLine {
                timestamp,
                level: record.level(),
                component: Ustr::from(record.metadata().target()),
                message: format!("{}", record.args()),
            };
            if let Err(SendError(LogEvent::Log(line))) = self.tx.send(LogEvent::Log(line)) {
                eprintln!("Error sending log event (receiver closed): {line}");
            }
        }
    }

    fn flush(&self) {
        if let Err(e) = self.tx.send(LogEvent::Flush) {
            eprintln!("Error sending flush log event (receiver closed): {e}");
        }
    }
}

impl Logger {
    /// Initializes the logger from the `FLASHPOOL_LOG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or invalid, or a logger is already installed.
    pub fn init_with_env() -> anyhow::Result<LogGuard> {
        let config = LoggerConfig::from_env()?;
        Self::init_with_config(config)
    }

    /// Initializes the logger with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed or the writer thread fails to spawn.
    pub fn init_with_config(config: LoggerConfig) -> anyhow::Result<LogGuard> {
        let (tx, rx) = std::sync::mpsc::channel::<LogEvent>();

        let logger = Self {
            tx,
            config: config.clone(),
        };

        let print_config = config.print_config;
        if print_config {
            println!("STATIC_MAX_LEVEL={STATIC_MAX_LEVEL}");
            println!("Logger initialized with {config:?}");
        }

        if let Err(e) = set_boxed_logger(Box::new(logger)) {
            anyhow::bail!("Cannot initialize logger because of error: {e}");
        }

        let handle = std::thread::Builder::new()
            .name(LOGGING.to_string())
            .spawn(move || Self::handle_messages(&config, &rx))?;

        let max_level = LevelFilter::Trace;
        set_max_level(max_level);
        if print_config {
            println!("Logger set as `log` implementation with max level {max_level}");
        }

        Ok(LogGuard::new(Some(handle)))
    }

    fn handle_messages(config: &LoggerConfig, rx: &std::sync::mpsc::Receiver<LogEvent>) {
        let mut stdout_writer = StdoutWriter::new(config.stdout_level, config.is_colored);
        let mut stderr_writer = StderrWriter::new(config.is_colored);

        // Continue to receive and handle log events until channel is hung up
        while let Ok(event) = rx.recv() {
            match event {
                LogEvent::Flush => {
                    stdout_writer.flush();
                    stderr_writer.flush();
                    break;
                }
                LogEvent::Log(line) => {
                    let forced = config
                        .component_level(&line.component)
                        .is_some_and(|level| line.level <= level);

                    if stderr_writer.enabled(&line) {
                        stderr_writer.write(&render(&line, config.is_colored));
                    } else if forced || stdout_writer.enabled(&line) {
                        stdout_writer.write(&render(&line, config.is_colored));
                    }
                }
            }
        }
    }
}

fn render(line: &LogLine, is_colored: bool) -> String {
    if is_colored {
        line.to_colored()
    } else {
        line.to_plain()
    }
}

/// Keeps the writer thread alive; flushes and joins it on drop.
#[derive(Debug)]
pub struct LogGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl LogGuard {
    /// Creates a new [`LogGuard`] instance.
    #[must_use]
    pub const fn new(handle: Option<std::thread::JoinHandle<()>>) -> Self {
        Self { handle }
    }
}

impl Default for LogGuard {
    /// Creates a new default [`LogGuard`] instance.
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        log::logger().flush();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            eprintln!("Error joining logging handle");
        }
    }
}
