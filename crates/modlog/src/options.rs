//! Configuration shared by a logger and every logger branched from it.

use std::{fmt, sync::Arc};

use crate::level::LevelOverride;

/// Function invoked with the exit code of a fatal message, after the message was written.
pub type ExitHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Behavior shared by a logger and the loggers branched from it with
/// [`Logger::module`](crate::Logger::module).
#[derive(Clone)]
pub struct Options {
    /// Capture a stack trace for every message at [`Level::Error`](crate::Level::Error) or
    /// above, even when [`Message::stack`](crate::Message::stack) was not called.
    pub include_stack_on_error: bool,

    /// Slot whose level, when set, supersedes the logger's own minimum level.
    pub level_override: Arc<LevelOverride>,

    /// Called with the exit code of fatal messages. Defaults to [`std::process::exit`].
    pub exit: ExitHandler,
}

impl Options {
    /// Sets [`Options::include_stack_on_error`].
    #[must_use]
    pub fn include_stack_on_error(mut self, include: bool) -> Self {
        self.include_stack_on_error = include;
        self
    }

    /// Sets [`Options::level_override`].
    #[must_use]
    pub fn level_override(mut self, slot: Arc<LevelOverride>) -> Self {
        self.level_override = slot;
        self
    }

    /// Sets [`Options::exit`].
    #[must_use]
    pub fn exit_handler(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Arc::new(exit);
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            include_stack_on_error: false,
            level_override: LevelOverride::global(),
            exit: Arc::new(|code: i32| std::process::exit(code)),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("include_stack_on_error", &self.include_stack_on_error)
            .field("level_override", &self.level_override.get())
            .finish_non_exhaustive()
    }
}
