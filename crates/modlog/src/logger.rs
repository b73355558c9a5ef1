//! The [`Logger`]: a module path, a minimum level, parameters, an engine and hooks.

use std::{
    borrow::Cow,
    error::Error,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::{Serialize, Serializer};
use time::format_description::OwnedFormatItem;

use crate::{
    engine::{text::ColorEngine, Engine},
    hooks::{self, HookEvent, Hooks},
    level::{AtomicLevel, Level},
    message::Message,
    options::Options,
    param::Param,
    pool::Pooled,
    record::Record,
    LoggerError,
};

/// Minimum level of a newly created logger.
const DEFAULT_LEVEL: Level = Level::Info;

/// What [`Logger::recover`] does after logging a caught panic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoverBehavior {
    /// Log the panic at [`Level::Error`] and swallow it.
    #[default]
    Log,

    /// Log the panic at [`Level::Panic`] and exit the process with the given code.
    /// A code of zero exits with `1`.
    Exit(i32),

    /// Log the panic at [`Level::Error`] and keep unwinding.
    Resume,
}

/// One segment of a logger's module path, optionally qualified by a scope.
///
/// Renders as `name`, or as `name@scope` when a scope is set, in both the text and the JSON
/// output. Compares equal to its rendered form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: Cow<'static, str>,
    scope: Option<Cow<'static, str>>,
}

impl Module {
    fn new(name: Cow<'static, str>, scope: Option<Cow<'static, str>>) -> Self {
        Self {
            name,
            scope: scope.filter(|scope| !scope.is_empty()),
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope set with [`Logger::module_with_scope`], if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(scope) = &self.scope {
            write!(f, "@{scope}")?;
        }
        Ok(())
    }
}

impl PartialEq<str> for Module {
    fn eq(&self, other: &str) -> bool {
        match &self.scope {
            None => self.name == other,
            Some(scope) => other
                .strip_prefix(&*self.name)
                .and_then(|rest| rest.strip_prefix('@'))
                == Some(&**scope),
        }
    }
}

impl PartialEq<&str> for Module {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Module {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A handle to a logger.
///
/// Cloning a `Logger` yields another handle to the same logger: parameters added or levels
/// set through one handle are visible through the other. Use [`Logger::module`] to derive an
/// independent logger for a sub-module.
///
/// ```
/// use modlog::{ColorEngine, Level, Logger};
///
/// let logger = Logger::new("app", ColorEngine::stdout().with_colors(false));
/// logger.set_level(Level::Debug).param("version", "1.2.0");
///
/// let users = logger.module("users");
/// users.info().param("id", 42).send("user created");
/// ```
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

struct Inner {
    modules: Vec<Module>,
    level: AtomicLevel,
    params: ArcSwap<Vec<Param>>,
    engine: ArcSwap<Arc<dyn Engine>>,
    time_format: ArcSwapOption<OwnedFormatItem>,
    hooks: Arc<Hooks>,
    options: Arc<Options>,
}

impl Logger {
    /// Creates a logger named `name`, writing through `engine`, with default [`Options`].
    pub fn new(name: impl Into<Cow<'static, str>>, engine: impl Engine + 'static) -> Self {
        Self::with_options(name, engine, Options::default())
    }

    /// Creates a logger named `name`, writing through `engine`.
    ///
    /// The name is the first module of the logger's module path.
    pub fn with_options(
        name: impl Into<Cow<'static, str>>,
        engine: impl Engine + 'static,
        options: Options,
    ) -> Self {
        let engine: Arc<dyn Engine> = Arc::new(engine);
        Self {
            inner: Arc::new(Inner {
                modules: vec![Module::new(name.into(), None)],
                level: AtomicLevel::new(DEFAULT_LEVEL),
                params: ArcSwap::default(),
                engine: ArcSwap::from_pointee(engine),
                time_format: ArcSwapOption::empty(),
                hooks: Arc::default(),
                options: Arc::new(options),
            }),
        }
    }

    /// Creates a logger named `name` writing colorized lines to standard output.
    pub fn stdout(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, ColorEngine::stdout())
    }

    /// Derives a logger for the sub-module `name`.
    ///
    /// The new logger's module path is this logger's path followed by `name`. It starts out
    /// with this logger's parameters, level, engine and time format, and changing any of them
    /// afterwards on either logger does not affect the other. Hooks and [`Options`] remain
    /// shared.
    pub fn module(&self, name: impl Into<Cow<'static, str>>) -> Self {
        self.branch(Module::new(name.into(), None))
    }

    /// Derives a logger for the sub-module `name`, qualified by `scope`.
    ///
    /// Behaves like [`Logger::module`]; the new segment renders as `name@scope`. An empty
    /// scope is ignored.
    ///
    /// ```
    /// use modlog::{ColorEngine, Logger};
    ///
    /// let logger = Logger::new("app", ColorEngine::stdout());
    /// let tenant = logger.module_with_scope("users", "tenant-7");
    /// assert_eq!(tenant.modules(), ["app", "users@tenant-7"]);
    /// ```
    pub fn module_with_scope(
        &self,
        name: impl Into<Cow<'static, str>>,
        scope: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.branch(Module::new(name.into(), Some(scope.into())))
    }

    fn branch(&self, module: Module) -> Self {
        let mut modules = Vec::with_capacity(self.inner.modules.len() + 1);
        modules.extend(self.inner.modules.iter().cloned());
        modules.push(module);

        Self {
            inner: Arc::new(Inner {
                modules,
                level: AtomicLevel::new(self.level()),
                params: ArcSwap::new(self.inner.params.load_full()),
                engine: ArcSwap::new(self.inner.engine.load_full()),
                time_format: ArcSwapOption::new(self.inner.time_format.load_full()),
                hooks: Arc::clone(&self.inner.hooks),
                options: Arc::clone(&self.inner.options),
            }),
        }
    }

    /// The module path, outermost module first.
    pub fn modules(&self) -> &[Module] {
        &self.inner.modules
    }

    /// Appends a parameter rendered with every message of this logger.
    ///
    /// Snapshots previously returned by [`Logger::params`] are not modified.
    pub fn param(
        &self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<serde_json::Value>,
    ) -> &Self {
        let param = Param::new(name, value);
        self.inner.params.rcu(|params| {
            let mut next = Vec::with_capacity(params.len() + 1);
            next.extend(params.iter().cloned());
            next.push(param.clone());
            next
        });
        self
    }

    /// A snapshot of the logger's parameters, in insertion order.
    pub fn params(&self) -> Arc<Vec<Param>> {
        self.inner.params.load_full()
    }

    /// Removes every parameter of this logger.
    pub fn clear_params(&self) -> &Self {
        self.inner.params.store(Arc::default());
        self
    }

    /// Sets the minimum level of emitted messages.
    pub fn set_level(&self, level: Level) -> &Self {
        self.inner.level.store(level);
        self
    }

    /// The logger's own minimum level. A level set in the [`Options::level_override`] slot
    /// takes precedence, see [`Logger::is_enabled`].
    pub fn level(&self) -> Level {
        self.inner.level.load()
    }

    /// Replaces the engine messages are written through.
    pub fn set_engine(&self, engine: impl Engine + 'static) -> &Self {
        let engine: Arc<dyn Engine> = Arc::new(engine);
        self.inner.engine.store(Arc::new(engine));
        self
    }

    /// The engine messages are written through.
    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&**self.inner.engine.load())
    }

    /// Overrides the timestamp format of the engines, using the
    /// [`time` format description](https://time-rs.github.io/book/api/format-description.html)
    /// syntax, for example `"[hour]:[minute]:[second].[subsecond digits:3]"`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::TimeFormatDescription`] if `format` is not a valid description.
    pub fn set_time_format(&self, format: &str) -> Result<&Self, LoggerError> {
        let format = time::format_description::parse_owned::<2>(format)?;
        self.inner.time_format.store(Some(Arc::new(format)));
        Ok(self)
    }

    /// Restores the engines' default timestamp format.
    pub fn clear_time_format(&self) -> &Self {
        self.inner.time_format.store(None);
        self
    }

    /// The timestamp format set with [`Logger::set_time_format`], if any.
    pub fn time_format(&self) -> Option<Arc<OwnedFormatItem>> {
        self.inner.time_format.load_full()
    }

    /// Whether messages at `level` are emitted.
    ///
    /// A level stored in the [`Options::level_override`] slot supersedes the logger's own level.
    pub fn is_enabled(&self, level: Level) -> bool {
        let minimum = self
            .inner
            .options
            .level_override
            .get()
            .unwrap_or_else(|| self.level());
        level >= minimum
    }

    /// Starts a message at `level`.
    pub fn log(&self, level: Level) -> Message<'_> {
        if self.is_enabled(level) {
            Message::pending(self, Record::acquire(level))
        } else {
            Message::filtered(self)
        }
    }

    /// Starts a [`Level::Trace`] message.
    pub fn trace(&self) -> Message<'_> {
        self.log(Level::Trace)
    }

    /// Starts a [`Level::Debug`] message.
    pub fn debug(&self) -> Message<'_> {
        self.log(Level::Debug)
    }

    /// Starts a [`Level::Info`] message.
    pub fn info(&self) -> Message<'_> {
        self.log(Level::Info)
    }

    /// Starts a [`Level::Warning`] message.
    pub fn warn(&self) -> Message<'_> {
        self.log(Level::Warning)
    }

    /// Starts a [`Level::Error`] message.
    pub fn error(&self) -> Message<'_> {
        self.log(Level::Error)
    }

    /// Starts a [`Level::Panic`] message. Once sent, the process exits with `exit_code`
    /// through the [`Options::exit`] handler, unless `exit_code` is zero.
    pub fn fatal(&self, exit_code: i32) -> Message<'_> {
        let mut message = self.log(Level::Panic);
        message.exit_code(exit_code);
        message
    }

    /// Registers a hook called with every message sent through this logger, the loggers
    /// derived from it with [`Logger::module`], and the logger it was derived from.
    ///
    /// Hooks run after the engine, in registration order. A panicking hook is reported on
    /// standard error and does not affect the caller or the other hooks.
    pub fn write_hook(&self, hook: impl Fn(&HookEvent<'_>) + Send + Sync + 'static) -> &Self {
        self.inner.hooks.add(Arc::new(hook));
        self
    }

    /// Registers a hook under `name`, replacing the hook previously registered under that name.
    pub fn named_hook(
        &self,
        name: impl Into<Cow<'static, str>>,
        hook: impl Fn(&HookEvent<'_>) + Send + Sync + 'static,
    ) -> &Self {
        self.inner.hooks.add_named(name.into(), Arc::new(hook));
        self
    }

    /// Removes the hook registered under `name`. Returns whether there was one.
    pub fn remove_hook(&self, name: &str) -> bool {
        self.inner.hooks.remove(name)
    }

    /// Removes every hook.
    pub fn clear_hooks(&self) -> &Self {
        self.inner.hooks.clear();
        self
    }

    /// Number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.len()
    }

    /// The options this logger was created with.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Runs `body`, turning a panic into a log message.
    ///
    /// Returns the value of `body`, or `None` if it panicked and `behavior` let the caller
    /// continue. The message carries the panic message and a stack trace; panics with a
    /// `Box<dyn Error + Send + Sync>` payload are logged like [`Message::throw`].
    ///
    /// With [`RecoverBehavior::Resume`] the panic resumes once the message was written.
    /// With [`RecoverBehavior::Exit`] the exit handler runs once the message was written; if it
    /// returns, so does this method.
    pub fn recover<R>(&self, behavior: RecoverBehavior, body: impl FnOnce() -> R) -> Option<R> {
        let payload = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => return Some(value),
            Err(payload) => payload,
        };

        let mut message = match behavior {
            RecoverBehavior::Exit(code) => self.fatal(if code == 0 { 1 } else { code }),
            RecoverBehavior::Log | RecoverBehavior::Resume => self.error(),
        };

        if let Some(error) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
            message.throw(&**error);
        } else {
            let text = hooks::panic_message(payload.as_ref())
                .unwrap_or("panic with a non-string payload");
            message.stack().send(text);
        }

        if behavior == RecoverBehavior::Resume {
            panic::resume_unwind(payload);
        }
        None
    }

    /// Writes `record` through the engine, notifies the hooks, returns the record to its pool
    /// and finally runs the exit handler if the record carries an exit code.
    ///
    /// The logger's parameters are read once, so the engine and the hooks see the same ones.
    pub(crate) fn finalize(&self, mut record: Pooled<'static, Record>) {
        if self.inner.options.include_stack_on_error
            && record.level >= Level::Error
            && !record.stack_included
        {
            record.capture_stack();
        }

        record.logger_params = Some(self.params());
        self.inner.engine.load().write(self, &record);
        self.inner.hooks.notify(self, &record);

        let exit_code = record.exit_code;
        drop(record);
        if exit_code != 0 {
            (self.inner.options.exit)(exit_code);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("modules", &self.inner.modules)
            .field("level", &self.level())
            .field("params", &self.inner.params.load_full())
            .field("hooks", &self.inner.hooks)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}
