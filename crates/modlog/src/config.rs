//! Building a [`Logger`] with console and file destinations from a configuration.

use std::{collections::HashMap, io, num::NonZeroUsize, sync::Arc};

use serde_json::{
    ser::{CompactFormatter, PrettyFormatter},
    Value,
};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;

use crate::{
    engine::{
        json::{JsonEngine, JsonEngineConfig},
        text::ColorEngine,
        Engine, Fanout,
    },
    Level, LevelOverride, Logger, LoggerError, Options,
};

/// Disables console colors when set to a non-empty value.
pub const DISABLE_COLORS_ENV: &str = "MODLOG_DISABLE_COLORS";

/// Sets the level override of built loggers, e.g. `MODLOG_LEVEL=warn`. Unknown levels are ignored.
pub const LEVEL_ENV: &str = "MODLOG_LEVEL";

/// Sets the level override of built loggers to [`Level::Debug`] when `true`, `on` or `1`.
pub const DEBUG_ENV: &str = "MODLOG_DEBUG";

/// Comprehensive configuration for a logger and its destinations.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Name of the logger, the first module of every message.
    pub name: String,

    /// Minimum level of emitted messages.
    pub level: Level,

    /// Timestamp format in the `time` format description syntax. If `None`, each format uses
    /// its default.
    pub time_format: Option<String>,

    /// Capture a stack trace for every message at [`Level::Error`] or above.
    pub include_stack_on_error: bool,

    /// Initial value of the built logger's [`LevelOverride`](crate::LevelOverride) slot,
    /// superseding [`LoggerConfig::level`]. The slot is private to the built logger and the
    /// loggers derived from it, and can be changed later through
    /// [`Options::level_override`](crate::Options::level_override).
    pub level_override: Option<Level>,

    /// Key-value pairs included in every JSON log entry.
    pub static_fields: HashMap<String, Value>,

    /// Include the `hostname` and `pid` in every JSON log entry.
    pub include_process_info: bool,

    /// Configuration for console logging. If `None`, console logging is disabled.
    pub console_config: Option<ConsoleLoggingConfig>,

    /// Configuration for file logging. If `None`, file logging is disabled.
    pub file_config: Option<FileLoggingConfig>,
}

/// Configuration for console logging.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLoggingConfig {
    /// The stream log entries are written to.
    pub target: ConsoleTarget,

    /// Output format for console logs.
    pub log_format: LogFormat,

    /// Colorize [`LogFormat::Text`] output.
    pub colors: bool,
}

/// Configuration for file logging.
#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    /// Directory where log files will be stored.
    pub directory: String,

    /// Prefix for log file names.
    pub file_name_prefix: String,

    /// Rotation strategy for log files.
    pub file_rotation: Rotation,

    /// Maximum number of log files to keep. If `None`, all files are kept.
    pub max_log_files: Option<NonZeroUsize>,

    /// Output format for file logs. Text is written without colors.
    pub log_format: LogFormat,
}

/// The standard stream console logs are written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleTarget {
    /// Standard output.
    #[default]
    Stdout,

    /// Standard error.
    Stderr,
}

/// Defines the output format of a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line, human-readable text.
    #[default]
    Text,

    /// Compact, single-line JSON format.
    CompactJson,

    /// Pretty-printed, multi-line JSON format.
    PrettyJson,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            level: Level::Info,
            time_format: None,
            include_stack_on_error: false,
            level_override: None,
            static_fields: HashMap::new(),
            include_process_info: false,
            console_config: Some(ConsoleLoggingConfig {
                target: ConsoleTarget::Stdout,
                log_format: LogFormat::Text,
                colors: true,
            }),
            file_config: None,
        }
    }
}

impl LoggerConfig {
    /// Applies the `MODLOG_*` environment variables, see [`LoggerConfig::apply_env_from`].
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`:
    ///
    /// - [`DISABLE_COLORS_ENV`] set to a non-empty value disables console colors.
    /// - [`DEBUG_ENV`] set to `true`, `on` or `1` sets the level override to
    ///   [`Level::Debug`].
    /// - [`LEVEL_ENV`] set to a known level sets the level override to that level, taking
    ///   precedence over [`DEBUG_ENV`].
    #[must_use]
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(DISABLE_COLORS_ENV).is_some_and(|value| !value.is_empty()) {
            if let Some(console) = &mut self.console_config {
                console.colors = false;
            }
        }

        let debug = lookup(DEBUG_ENV).is_some_and(|value| {
            matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1")
        });
        if debug {
            self.level_override = Some(Level::Debug);
        }

        if let Some(level) = lookup(LEVEL_ENV).as_deref().and_then(Level::parse_lossy) {
            self.level_override = Some(level);
        }

        self
    }
}

/// Constructs a [`Logger`] based on the provided [`LoggerConfig`].
///
/// Every enabled destination gets its own engine; messages are written to the console first
/// and then to the file.
///
/// # Example
///
/// ```
/// use modlog::{build_logger, ConsoleLoggingConfig, ConsoleTarget, LogFormat, LoggerConfig};
///
/// let config = LoggerConfig {
///     name: "my_app".to_owned(),
///     console_config: Some(ConsoleLoggingConfig {
///         target: ConsoleTarget::Stderr,
///         log_format: LogFormat::CompactJson,
///         colors: false,
///     }),
///     ..LoggerConfig::default()
/// }
/// .apply_env();
///
/// let logger = build_logger(config).expect("valid logging configuration");
/// logger.info().param("port", 8080).send("listening");
/// ```
///
/// # Errors
///
/// Returns [`LoggerError`] if any part of the configuration is invalid: an empty name, no
/// destination, an invalid time format, a reserved JSON static field, or a log directory that
/// cannot be created.
pub fn build_logger(config: LoggerConfig) -> Result<Logger, LoggerError> {
    if config.name.is_empty() {
        return Err(LoggerError::Configuration(
            "The logger name must not be empty".to_owned(),
        ));
    }
    if config.console_config.is_none() && config.file_config.is_none() {
        return Err(LoggerError::Configuration(
            "At least one of console or file logging must be configured".to_owned(),
        ));
    }

    let json_config = JsonEngineConfig {
        static_fields: config.static_fields,
        include_process_info: config.include_process_info,
    };

    let mut fanout = Fanout::default();

    // Console logging
    if let Some(console_config) = config.console_config {
        let engine = match console_config.target {
            ConsoleTarget::Stdout => {
                let stdout: fn() -> io::Stdout = io::stdout;
                build_engine(
                    console_config.log_format,
                    stdout,
                    console_config.colors,
                    &json_config,
                )?
            }
            ConsoleTarget::Stderr => {
                let stderr: fn() -> io::Stderr = io::stderr;
                build_engine(
                    console_config.log_format,
                    stderr,
                    console_config.colors,
                    &json_config,
                )?
            }
        };
        fanout = fanout.with_shared(engine);
    }

    // File logging
    if let Some(file_config) = config.file_config {
        let mut file_appender_builder = RollingFileAppender::builder()
            .rotation(file_config.file_rotation)
            .filename_prefix(file_config.file_name_prefix);

        if let Some(max_log_files) = file_config.max_log_files {
            file_appender_builder = file_appender_builder.max_log_files(usize::from(max_log_files));
        }

        let file_appender = file_appender_builder.build(&file_config.directory)?;
        let engine = build_engine(file_config.log_format, file_appender, false, &json_config)?;
        fanout = fanout.with_shared(engine);
    }

    let level_override = Arc::new(LevelOverride::new());
    level_override.set(config.level_override);
    let options = Options::default()
        .include_stack_on_error(config.include_stack_on_error)
        .level_override(level_override);

    let logger = Logger::with_options(config.name, fanout, options);
    logger.set_level(config.level);
    if let Some(time_format) = &config.time_format {
        logger.set_time_format(time_format)?;
    }

    Ok(logger)
}

fn build_engine<W>(
    log_format: LogFormat,
    writer: W,
    colors: bool,
    json_config: &JsonEngineConfig,
) -> Result<Arc<dyn Engine>, LoggerError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let engine: Arc<dyn Engine> = match log_format {
        LogFormat::Text => Arc::new(ColorEngine::new(writer).with_colors(colors)),
        LogFormat::CompactJson => Arc::new(JsonEngine::with_config(
            json_config.clone(),
            writer,
            CompactFormatter,
        )?),
        LogFormat::PrettyJson => Arc::new(JsonEngine::with_config(
            json_config.clone(),
            writer,
            PrettyFormatter::new(),
        )?),
    };
    Ok(engine)
}
