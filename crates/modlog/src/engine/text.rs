//! Human readable, optionally colorized, single line output.
//!
//! Format: `<time> | <LEVEL> | <module1> <module2> | <name1>(<value1>) <name2>(<value2>) | <duration> -> <message>`
//!
//! A module with a scope is rendered as `<module>@<scope>`.
//! The parameter and duration segments are only present when there are parameters and when the
//! duration is positive. Details follow the line on a new line as JSON, and a captured stack
//! trace follows after that, uncolored.

use std::{fmt, io, io::Write, time::Duration};

use time::{format_description::BorrowedFormatItem, macros::format_description};
use tracing_subscriber::fmt::MakeWriter;

use super::{write_time, Engine, Output};
use crate::{param::ChainedParams, pool::Pool, record::Record, Logger, LoggerError};

/// Default timestamp format of the text output, e.g. `24.12.2024 18:30:05`.
pub const DEFAULT_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]:[second]");

const SEPARATOR: &[u8] = b" | ";

const MAX_IDLE_BUFFERS: usize = 32;
const BUFFER_HIGH_WATER: usize = 64 * 1024;

/// An [`Engine`] writing human readable lines, colorized per level when colors are enabled.
///
/// With colors disabled the output is byte-for-byte the colored output without the escape
/// sequences.
#[derive(Debug)]
pub struct ColorEngine<W> {
    output: Output<W>,
    colors: bool,
    pretty_details: bool,
    buffers: Pool<Vec<u8>>,
}

impl ColorEngine<fn() -> io::Stdout> {
    /// Creates an engine writing colorized lines to standard output.
    pub fn stdout() -> Self {
        let stdout: fn() -> io::Stdout = io::stdout;
        Self::new(stdout)
    }
}

impl<W> ColorEngine<W>
where
    W: for<'a> MakeWriter<'a>,
{
    /// Creates an engine writing colorized lines to `dst_writer`.
    pub fn new(dst_writer: W) -> Self {
        Self {
            output: Output::new(dst_writer),
            colors: true,
            pretty_details: false,
            buffers: Pool::new(MAX_IDLE_BUFFERS, BUFFER_HIGH_WATER),
        }
    }

    /// Enables or disables terminal colors.
    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Renders message details as indented, multi-line JSON instead of compact JSON.
    #[must_use]
    pub fn with_pretty_details(mut self, pretty: bool) -> Self {
        self.pretty_details = pretty;
        self
    }
}

impl<W> Engine for ColorEngine<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync,
{
    fn write(&self, logger: &Logger, record: &Record) {
        let mut buffer = self.buffers.acquire();
        if let Err(error) =
            format_entry(logger, record, self.colors, self.pretty_details, &mut buffer)
        {
            tracing::warn!("Failed to format log entry: {error}");
            return;
        }

        if let Err(error) = self.output.write_entry(&buffer) {
            tracing::warn!("Failed to write log entry: {error}");
        }
    }
}

/// Renders `record` in the text format into `buffer`, newline terminated.
pub(crate) fn format_entry(
    logger: &Logger,
    record: &Record,
    colors: bool,
    pretty_details: bool,
    buffer: &mut Vec<u8>,
) -> Result<(), LoggerError> {
    let style = record.level().style();
    if colors {
        write!(buffer, "{}", style.prefix())?;
    }

    write_time(logger, record, DEFAULT_TIME_FORMAT, buffer)?;
    buffer.extend_from_slice(SEPARATOR);
    buffer.extend_from_slice(record.level().as_str().as_bytes());
    buffer.extend_from_slice(SEPARATOR);

    for module in logger.modules() {
        write!(buffer, "{module} ")?;
    }

    let params = ChainedParams {
        first: record.logger_params(),
        second: record.params(),
    };
    if !params.is_empty() {
        buffer.extend_from_slice(b"| ");
        for param in params.iter() {
            write!(buffer, "{param} ")?;
        }
    }

    if record.duration() > Duration::ZERO {
        write!(buffer, "| {} ", DisplayDuration(record.duration()))?;
    }

    buffer.extend_from_slice(b"-> ");
    buffer.extend_from_slice(record.message().as_bytes());

    if let Some(details) = record.details() {
        buffer.push(b'\n');
        if pretty_details {
            serde_json::to_writer_pretty(&mut *buffer, details)?;
        } else {
            serde_json::to_writer(&mut *buffer, details)?;
        }
    }

    if colors {
        write!(buffer, "{}", style.suffix())?;
    }
    buffer.push(b'\n');

    if let Some(stack) = record.stack() {
        buffer.extend_from_slice(stack.as_bytes());
        if !stack.ends_with('\n') {
            buffer.push(b'\n');
        }
    }

    Ok(())
}

/// Durations of a millisecond or more are rounded to the millisecond.
struct DisplayDuration(Duration);

impl fmt::Display for DisplayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NANOS_PER_MILLI: u128 = 1_000_000;

        let nanos = self.0.as_nanos();
        if nanos < NANOS_PER_MILLI {
            return write!(f, "{:?}", self.0);
        }

        let millis = (nanos + NANOS_PER_MILLI / 2) / NANOS_PER_MILLI;
        let rounded = Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX));
        write!(f, "{rounded:?}")
    }
}
