//! `modlog` is a structured, leveled logging library organized around module paths.
//!
//! It offers:
//! - A [`Logger`] carrying a module path, a minimum [`Level`] and parameters rendered with
//!   every message. [`Logger::module`] derives independent loggers for sub-modules.
//! - A [`Message`] builder per log call, attaching parameters, structured details, durations,
//!   stack traces and exit codes before a single [`Message::send`]. Messages below the
//!   minimum level are not formatted at all, and the data of emitted messages is pooled.
//! - Pluggable [`Engine`]s: [`ColorEngine`] for human readable lines and [`JsonEngine`] for
//!   newline delimited JSON, combined with [`Fanout`].
//! - Hooks ([`Logger::write_hook`]) mirroring messages to external sinks, and
//!   [`Logger::recover`] turning panics into log messages.
//! - A central [`build_logger`] function constructing a logger with console and file
//!   destinations from a [`LoggerConfig`].
//!
//! ```
//! use modlog::{JsonEngine, Logger};
//!
//! let logger = Logger::new("billing", JsonEngine::new(std::io::stdout));
//! logger.param("region", "eu-west-1");
//!
//! let invoices = logger.module("invoices");
//! invoices
//!     .warn()
//!     .param("invoice", 1042)
//!     .details(serde_json::json!({ "amount": 99.5, "currency": "EUR" }))
//!     .send(format_args!("payment retried {} times", 3));
//! ```
//!
//! Failures to format or write an entry never fail the logging call; they are reported through
//! [`tracing`] at the `WARN` level.

mod config;
mod engine;
mod hooks;
mod level;
mod logger;
mod message;
mod options;
mod param;
mod pool;
mod record;
#[cfg(test)]
mod testing;

pub use tracing_appender::rolling::Rotation;

pub use self::{
    config::{
        build_logger, ConsoleLoggingConfig, ConsoleTarget, FileLoggingConfig, LogFormat,
        LoggerConfig, DEBUG_ENV, DISABLE_COLORS_ENV, LEVEL_ENV,
    },
    engine::{
        json::{JsonEngine, JsonEngineConfig},
        text::{ColorEngine, DEFAULT_TIME_FORMAT},
        Engine, Fanout, Output,
    },
    hooks::{Hook, HookEvent},
    level::{Level, LevelOverride, ParseLevelError},
    logger::{Logger, Module, RecoverBehavior},
    message::Message,
    options::{ExitHandler, Options},
    param::{DisplayValue, Param},
    record::Record,
};

mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const TIME: &str = "time";
    pub(crate) const LEVEL: &str = "level";
    pub(crate) const HOSTNAME: &str = "hostname";
    pub(crate) const PID: &str = "pid";
    pub(crate) const MODULE: &str = "module";
    pub(crate) const PARAMS: &str = "params";
    pub(crate) const DURATION: &str = "duration";
    pub(crate) const STACK: &str = "stack";
    pub(crate) const DETAILS: &str = "details";
    pub(crate) const MESSAGE: &str = "message";

    pub(crate) static IMPLICIT_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
        [
            TIME, LEVEL, HOSTNAME, PID, MODULE, PARAMS, DURATION, STACK, DETAILS, MESSAGE,
        ]
        .iter()
        .copied()
        .collect()
    });
}

/// Errors that can occur while configuring a logger.
///
/// Sending messages never fails; these errors are only returned by construction and
/// configuration functions.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Represents an error in configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Represents an error during JSON serialization.
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Represents an invalid timestamp format description.
    #[error("Failed to parse time format description: {0}")]
    TimeFormatDescription(#[from] time::error::InvalidFormatDescription),

    /// Represents an error while formatting a timestamp.
    #[error("Failed to format timestamp: {0}")]
    TimeFormatting(#[from] time::error::Format),

    /// Represents an error during initialization of the rolling file appender.
    #[error("Failed to initialize rolling file appender: {0}")]
    FileAppenderInitialization(#[from] tracing_appender::rolling::InitError),

    /// Represents an I/O error while rendering an entry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
