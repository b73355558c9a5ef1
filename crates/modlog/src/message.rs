//! The per-call message builder returned by [`Logger::info`] and friends.

use std::{
    borrow::Cow, error::Error, fmt, fmt::Write as _, mem, panic::Location, time::Duration,
};

use serde::Serialize;
use serde_json::Value;

use crate::{param::Param, pool::Pooled, record::Record, Logger};

/// A log message under construction.
///
/// Messages are created through the level methods of a [`Logger`]. Values are attached with
/// the chaining methods and the message is emitted with exactly one call to [`Message::send`]
/// or [`Message::throw`].
///
/// When the message's level is below the logger's minimum, the returned message is
/// *filtered*: every method is a no-op and nothing is formatted.
///
/// ```
/// # use modlog::{Logger, Fanout};
/// let logger = Logger::new("app", Fanout::default());
/// logger.info().param("user", 42).send(format_args!("logged in after {} attempts", 2));
/// ```
///
/// A message that is dropped without being sent is discarded.
#[must_use = "a message is only emitted by `send()` or `throw()`"]
pub struct Message<'l> {
    logger: &'l Logger,
    state: State,
}

enum State {
    Filtered,
    Pending(Pooled<'static, Record>),
    Sent,
}

impl<'l> Message<'l> {
    pub(crate) fn pending(logger: &'l Logger, record: Pooled<'static, Record>) -> Self {
        Self {
            logger,
            state: State::Pending(record),
        }
    }

    pub(crate) fn filtered(logger: &'l Logger) -> Self {
        Self {
            logger,
            state: State::Filtered,
        }
    }

    /// Whether the message was filtered out by the logger's level.
    pub fn is_filtered(&self) -> bool {
        matches!(self.state, State::Filtered)
    }

    fn record(&mut self) -> Option<&mut Record> {
        match &mut self.state {
            State::Pending(record) => Some(&mut **record),
            State::Filtered | State::Sent => None,
        }
    }

    /// Appends a parameter to this message. Parameters are rendered after the logger's own.
    pub fn param(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Value>,
    ) -> &mut Self {
        if let Some(record) = self.record() {
            record.params.push(Param::new(name, value));
        }
        self
    }

    /// Attaches a structured payload. If `details` fails to serialize, the error text is
    /// attached instead.
    pub fn details(&mut self, details: impl Serialize) -> &mut Self {
        if let Some(record) = self.record() {
            let value = serde_json::to_value(details)
                .unwrap_or_else(|error| Value::String(error.to_string()));
            record.details = Some(value);
        }
        self
    }

    /// Attaches the time an operation took.
    pub fn duration(&mut self, duration: Duration) -> &mut Self {
        if let Some(record) = self.record() {
            record.duration = duration;
        }
        self
    }

    /// Captures the current stack trace. Calling it again replaces the previous capture.
    pub fn stack(&mut self) -> &mut Self {
        if let Some(record) = self.record() {
            record.capture_stack();
        }
        self
    }

    /// Appends a `caller` parameter holding the `file:line` this method was called from.
    #[track_caller]
    pub fn caller(&mut self) -> &mut Self {
        let location = Location::caller();
        if let Some(record) = self.record() {
            record.params.push(Param::new(
                "caller",
                format!("{}:{}", location.file(), location.line()),
            ));
        }
        self
    }

    /// Sets the code the process exits with once the message was written. Zero means the
    /// process keeps running.
    pub fn exit_code(&mut self, code: i32) -> &mut Self {
        if let Some(record) = self.record() {
            record.exit_code = code;
        }
        self
    }

    /// Sends the message with `error` as its text.
    ///
    /// The description of `error` and of its chain of sources is attached to the record and a
    /// stack trace is captured.
    ///
    /// # Panics
    ///
    /// Panics if the message was already sent.
    pub fn throw(&mut self, error: &(dyn Error + 'static)) {
        if let Some(record) = self.record() {
            let mut description = error.to_string();
            let mut source = error.source();
            while let Some(cause) = source {
                let _ = write!(description, ": {cause}");
                source = cause.source();
            }
            record.error = Some(description);
            record.capture_stack();
        }
        self.send(error);
    }

    /// Renders `message` and emits the record through the logger's engine and hooks.
    ///
    /// `message` is only formatted when the message is not filtered, so
    /// `format_args!` can be passed without formatting cost for disabled levels.
    ///
    /// If an exit code was set, the logger's exit handler runs after the record was written.
    ///
    /// # Panics
    ///
    /// Panics if the message was already sent.
    pub fn send(&mut self, message: impl fmt::Display) {
        let mut record = match mem::replace(&mut self.state, State::Sent) {
            State::Pending(record) => record,
            State::Filtered => {
                self.state = State::Filtered;
                return;
            }
            #[allow(clippy::panic)]
            State::Sent => panic!("message was already sent"),
        };

        let _ = write!(record.message, "{message}");
        self.logger.finalize(record);
    }
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Filtered => "filtered",
            State::Pending(_) => "pending",
            State::Sent => "sent",
        };
        f.debug_struct("Message")
            .field("logger", &self.logger.modules())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use serde::ser::{Error as _, Serializer};

    use super::*;
    use crate::{engine::text::ColorEngine, testing::Capture, Level, LevelOverride, Options};

    fn logger(capture: &Capture) -> Logger {
        Logger::with_options(
            "app",
            ColorEngine::new(capture.clone()).with_colors(false),
            Options::default().level_override(Arc::new(LevelOverride::new())),
        )
    }

    #[test]
    #[should_panic(expected = "message was already sent")]
    fn sending_twice_panics() {
        let capture = Capture::default();
        let logger = logger(&capture);
        let mut message = logger.info();
        message.send("first");
        message.send("second");
    }

    #[test]
    fn first_send_is_written_before_the_second_panics() {
        let capture = Capture::default();
        let logger = logger(&capture);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut message = logger.info();
            message.send("first");
            message.send("second");
        }));
        assert!(result.is_err());
        assert_eq!(capture.lines().len(), 1);
    }

    #[test]
    fn filtered_messages_do_nothing() {
        struct Counted<'a>(&'a AtomicUsize);

        impl fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fetch_add(1, Ordering::Relaxed);
                f.write_str("counted")
            }
        }

        let capture = Capture::default();
        let logger = logger(&capture);
        logger.set_level(Level::Warning);

        let formatted = AtomicUsize::new(0);
        let mut message = logger.debug();
        assert!(message.is_filtered());
        message
            .param("id", 1)
            .details(serde_json::json!({"a": 1}))
            .stack()
            .caller()
            .exit_code(3)
            .send(Counted(&formatted));
        // Filtered messages may be sent any number of times.
        message.send(Counted(&formatted));

        assert_eq!(formatted.load(Ordering::Relaxed), 0);
        assert!(capture.writes().is_empty());

        logger.warn().send(Counted(&formatted));
        assert_eq!(formatted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dropped_messages_are_not_emitted() {
        let capture = Capture::default();
        let logger = logger(&capture);
        {
            let mut message = logger.error();
            message.param("id", 1);
        }
        assert!(capture.writes().is_empty());
    }

    #[test]
    fn caller_points_at_the_call_site() {
        let capture = Capture::default();
        let logger = logger(&capture);
        let line = line!() + 1;
        logger.info().caller().send("here");

        let text = capture.text();
        assert!(
            text.contains(&format!("caller({}:{line})", file!())),
            "{text}"
        );
    }

    #[test]
    fn unserializable_details_keep_the_error_text() {
        struct Broken;

        impl Serialize for Broken {
            fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(S::Error::custom("broken payload"))
            }
        }

        let capture = Capture::default();
        let logger = logger(&capture);
        logger.info().details(Broken).send("with details");

        assert!(capture.text().contains("\"broken payload\""));
    }

    #[test]
    fn throw_records_the_error_chain() {
        #[derive(Debug)]
        struct Outer(io::Error);

        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("request failed")
            }
        }

        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let capture = Capture::default();
        let logger = logger(&capture);
        let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        logger.write_hook(move |event| {
            seen.lock().push((
                event.record.error().map(str::to_owned),
                event.record.stack().is_some(),
            ));
        });

        let error = Outer(io::Error::new(io::ErrorKind::TimedOut, "upstream timed out"));
        logger.error().throw(&error);

        assert_eq!(
            *errors.lock(),
            [(Some("request failed: upstream timed out".to_owned()), true)]
        );
        assert!(capture.lines()[0].ends_with("-> request failed"));
    }
}
