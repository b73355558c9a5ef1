//! Write engines: the formatting and transport step of the logging pipeline.
//!
//! An [`Engine`] is invoked once per finalized message. The stock engines are
//! [`ColorEngine`](text::ColorEngine), rendering human readable lines, and
//! [`JsonEngine`](json::JsonEngine), rendering newline delimited JSON. [`Fanout`] broadcasts
//! each message to several engines.

pub mod json;
pub mod text;

use std::{fmt, io, io::Write, sync::Arc};

use parking_lot::Mutex;
use time::formatting::Formattable;
use tracing_subscriber::fmt::MakeWriter;

use crate::{record::Record, Logger, LoggerError};

/// Formats finalized messages and writes them to a destination.
///
/// Engines are shared by every thread logging through a logger, so implementations must
/// synchronize access to their destination themselves. The [`Record`] is reused as soon as
/// `write()` returns and must not be retained.
///
/// Failures to format or write are not reported to the caller: logging must not fail the
/// operation that logged.
///
/// Any `Fn(&Logger, &Record) + Send + Sync` closure is an engine.
pub trait Engine: Send + Sync {
    /// Formats and writes `record`, sent through `logger`.
    fn write(&self, logger: &Logger, record: &Record);
}

impl<F> Engine for F
where
    F: Fn(&Logger, &Record) + Send + Sync,
{
    fn write(&self, logger: &Logger, record: &Record) {
        self(logger, record)
    }
}

/// An engine invoking several engines in turn.
#[derive(Clone, Default)]
pub struct Fanout {
    engines: Vec<Arc<dyn Engine>>,
}

impl Fanout {
    /// Creates a fanout over the given engines.
    pub fn new(engines: impl IntoIterator<Item = Arc<dyn Engine>>) -> Self {
        Self {
            engines: engines.into_iter().collect(),
        }
    }

    /// Adds an engine, invoked after the engines already present.
    #[must_use]
    pub fn with(mut self, engine: impl Engine + 'static) -> Self {
        self.engines.push(Arc::new(engine));
        self
    }

    /// Adds an engine shared with other owners.
    #[must_use]
    pub fn with_shared(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engines.push(engine);
        self
    }

    /// Number of engines messages are broadcast to.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether there are no engines, in which case messages are discarded.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Engine for Fanout {
    fn write(&self, logger: &Logger, record: &Record) {
        for engine in &self.engines {
            engine.write(logger, record);
        }
    }
}

impl fmt::Debug for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fanout")
            .field("engines", &self.engines.len())
            .finish()
    }
}

/// A destination shared by concurrent writers.
///
/// Entries are formatted by the caller before [`Output::write_entry`] is invoked; the lock is
/// only held while the entry is written and flushed, so entries are never interleaved with
/// each other.
pub struct Output<W> {
    make_writer: W,
    lock: Mutex<()>,
}

impl<W> Output<W>
where
    W: for<'a> MakeWriter<'a>,
{
    /// Wraps a destination.
    pub fn new(make_writer: W) -> Self {
        Self {
            make_writer,
            lock: Mutex::new(()),
        }
    }

    /// Writes one entry with a single `write_all()` call and flushes the destination.
    ///
    /// The flush makes the entry durable before a fatal message terminates the process.
    pub fn write_entry(&self, entry: &[u8]) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut writer = self.make_writer.make_writer();
        writer.write_all(entry)?;
        writer.flush()
    }
}

impl<W> fmt::Debug for Output<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("writer", &std::any::type_name::<W>())
            .finish_non_exhaustive()
    }
}

/// Writes the creation time of `record`, using the logger's time format if it has one.
pub(crate) fn write_time<F>(
    logger: &Logger,
    record: &Record,
    default_format: &F,
    buffer: &mut Vec<u8>,
) -> Result<(), LoggerError>
where
    F: Formattable + ?Sized,
{
    match logger.time_format() {
        Some(format) => record.time().format_into(buffer, &*format)?,
        None => record.time().format_into(buffer, default_format)?,
    };
    Ok(())
}
