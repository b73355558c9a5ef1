//! The data accumulated by a message and handed to write engines.

use std::{
    backtrace::Backtrace,
    fmt::Write as _,
    mem,
    sync::{Arc, LazyLock},
    time::Duration,
};

use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    level::Level,
    param::Param,
    pool::{Pool, Pooled, Recycle},
};

const MAX_IDLE_RECORDS: usize = 256;

/// Records retaining more than this many bytes are not pooled.
const RECORD_HIGH_WATER: usize = 16 * 1024;

static RECORDS: LazyLock<Pool<Record>> =
    LazyLock::new(|| Pool::new(MAX_IDLE_RECORDS, RECORD_HIGH_WATER));

/// A finalized log message, as seen by [`Engine`](crate::Engine)s and hooks.
///
/// Records are pooled and reused as soon as the engine and hooks return; they must not be
/// retained past the call they are passed to.
#[derive(Debug)]
pub struct Record {
    pub(crate) level: Level,
    pub(crate) time: OffsetDateTime,
    pub(crate) logger_params: Option<Arc<Vec<Param>>>,
    pub(crate) params: Vec<Param>,
    pub(crate) details: Option<Value>,
    pub(crate) duration: Duration,
    pub(crate) stack: String,
    pub(crate) stack_included: bool,
    pub(crate) exit_code: i32,
    pub(crate) error: Option<String>,
    pub(crate) message: String,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            level: Level::Info,
            time: OffsetDateTime::UNIX_EPOCH,
            logger_params: None,
            params: Vec::new(),
            details: None,
            duration: Duration::ZERO,
            stack: String::new(),
            stack_included: false,
            exit_code: 0,
            error: None,
            message: String::new(),
        }
    }
}

impl Record {
    /// Takes a record out of the process-wide pool and stamps it.
    pub(crate) fn acquire(level: Level) -> Pooled<'static, Self> {
        let mut record = RECORDS.acquire();
        record.level = level;
        record.time = OffsetDateTime::now_utc();
        record
    }

    /// Captures the current call stack into the reusable stack buffer, replacing any
    /// previous capture.
    pub(crate) fn capture_stack(&mut self) {
        self.stack.clear();
        let _ = write!(self.stack, "{}", Backtrace::force_capture());
        self.stack_included = true;
    }

    /// The message level.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The time the message was created.
    pub fn time(&self) -> OffsetDateTime {
        self.time
    }

    /// The parameters of the sending logger, as they were when the message was sent.
    ///
    /// Engines and hooks see the same snapshot, even if the logger gains parameters while the
    /// message is being written.
    pub fn logger_params(&self) -> &[Param] {
        match &self.logger_params {
            Some(params) => params,
            None => &[],
        }
    }

    /// Parameters attached to this message only.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Structured payload attached with [`Message::details`](crate::Message::details).
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Elapsed time attached to the message; zero if none.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The captured stack trace, if one was requested.
    pub fn stack(&self) -> Option<&str> {
        self.stack_included.then_some(self.stack.as_str())
    }

    /// The exit code the process terminates with after this message; zero if none.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Description of the error thrown with [`Message::throw`](crate::Message::throw),
    /// including its sources.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The user supplied message text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Recycle for Record {
    fn reset(&mut self) {
        self.level = Level::Info;
        self.time = OffsetDateTime::UNIX_EPOCH;
        self.logger_params = None;
        self.params.clear();
        self.details = None;
        self.duration = Duration::ZERO;
        self.stack.clear();
        self.stack_included = false;
        self.exit_code = 0;
        self.error = None;
        self.message.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.message.capacity()
            + self.stack.capacity()
            + self.params.capacity() * mem::size_of::<Param>()
    }
}
