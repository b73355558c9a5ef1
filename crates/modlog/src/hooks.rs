//! Callbacks observing finalized messages, used to mirror log output to external sinks.

use std::{
    any::Any,
    borrow::Cow,
    fmt,
    io::Write,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, LazyLock},
};

use arc_swap::ArcSwap;

use crate::{
    engine::text,
    pool::{Pool, Pooled},
    record::Record,
    Logger,
};

static RENDER_BUFFERS: LazyLock<Pool<Vec<u8>>> = LazyLock::new(|| Pool::new(64, 64 * 1024));

/// What a hook receives for every message sent through a logger it is registered on.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    /// The logger the message was sent through.
    pub logger: &'a Logger,

    /// The finalized message. [`Record::message`] is the user supplied text.
    pub record: &'a Record,

    /// The message rendered in the text format, newline terminated.
    ///
    /// The rendering does not depend on the logger's engine: it never has colors and details
    /// are always compact JSON. Parameters are those of [`Record::logger_params`] and
    /// [`Record::params`], as the engine saw them.
    pub rendered: &'a [u8],
}

/// A hook callback.
pub type Hook = Arc<dyn Fn(&HookEvent<'_>) + Send + Sync>;

#[derive(Clone)]
struct HookEntry {
    name: Option<Cow<'static, str>>,
    hook: Hook,
}

/// Hooks shared by a logger and every logger branched from it.
///
/// The list is replaced as a whole on every change, so notifying never locks.
#[derive(Default)]
pub(crate) struct Hooks {
    entries: ArcSwap<Vec<HookEntry>>,
}

impl Hooks {
    pub(crate) fn add(&self, hook: Hook) {
        self.entries.rcu(|entries| {
            let mut next = Vec::clone(entries);
            next.push(HookEntry {
                name: None,
                hook: Arc::clone(&hook),
            });
            next
        });
    }

    /// Adds a named hook, replacing an existing hook with the same name in place.
    pub(crate) fn add_named(&self, name: Cow<'static, str>, hook: Hook) {
        self.entries.rcu(|entries| {
            let mut next = Vec::clone(entries);
            let entry = HookEntry {
                name: Some(name.clone()),
                hook: Arc::clone(&hook),
            };
            match next
                .iter_mut()
                .find(|existing| existing.name.as_deref() == Some(name.as_ref()))
            {
                Some(existing) => *existing = entry,
                None => next.push(entry),
            }
            next
        });
    }

    pub(crate) fn remove(&self, name: &str) -> bool {
        let previous = self.entries.rcu(|entries| {
            entries
                .iter()
                .filter(|entry| entry.name.as_deref() != Some(name))
                .cloned()
                .collect::<Vec<_>>()
        });
        previous
            .iter()
            .any(|entry| entry.name.as_deref() == Some(name))
    }

    pub(crate) fn clear(&self) {
        self.entries.store(Arc::default());
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Runs every hook with the message. A panicking hook is reported on standard error and
    /// does not prevent the remaining hooks from running.
    pub(crate) fn notify(&self, logger: &Logger, record: &Record) {
        let entries = self.entries.load();
        if entries.is_empty() {
            return;
        }

        let mut rendered: Pooled<'_, Vec<u8>> = RENDER_BUFFERS.acquire();
        if let Err(error) = text::format_entry(logger, record, false, false, &mut rendered) {
            tracing::warn!("Failed to render log entry for hooks: {error}");
            return;
        }

        let event = HookEvent {
            logger,
            record,
            rendered: &rendered,
        };
        for entry in entries.iter() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (entry.hook)(&event))) {
                report_hook_panic(entry.name.as_deref(), payload.as_ref());
            }
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.load();
        f.debug_list()
            .entries(
                entries
                    .iter()
                    .map(|entry| entry.name.as_deref().unwrap_or("<write hook>")),
            )
            .finish()
    }
}

/// Extracts the message of a panic payload, if it carries one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

fn report_hook_panic(name: Option<&str>, payload: &(dyn Any + Send)) {
    let message = panic_message(payload).unwrap_or("non-string panic payload");
    let _ = writeln!(
        std::io::stderr().lock(),
        "[{}] log hook `{}` panicked: {message}",
        env!("CARGO_PKG_NAME"),
        name.unwrap_or("<write hook>"),
    );
}
