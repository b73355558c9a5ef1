//! Message severities and the minimum-level override slot.

use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, LazyLock,
    },
};

use nu_ansi_term::{Color, Style};

/// Severity of a log message, ordered from the most verbose to the most severe.
///
/// A logger emits a message only if the message's level is greater than or equal to the
/// logger's minimum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Very verbose diagnostics, usually disabled.
    Trace,

    /// Information useful while developing or debugging.
    Debug,

    /// Normal operational messages.
    Info,

    /// Something unexpected happened, but the application can continue.
    Warning,

    /// An operation failed.
    Error,

    /// An unrecoverable failure; typically emitted through [`Logger::fatal`](crate::Logger::fatal).
    Panic,
}

impl Level {
    /// All levels, from the least to the most severe.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Panic,
    ];

    /// Returns the fixed uppercase label of the level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Panic => "PANIC",
        }
    }

    /// Returns the terminal style used by the color engine for this level.
    pub fn style(self) -> Style {
        match self {
            Self::Trace => Style::new().fg(Color::White),
            Self::Debug => Style::new().fg(Color::Magenta).italic(),
            Self::Info => Style::new().fg(Color::Blue),
            Self::Warning => Style::new().fg(Color::Yellow).bold(),
            Self::Error => Style::new().fg(Color::Red).bold(),
            Self::Panic => Style::new().fg(Color::Red).on(Color::Black).bold(),
        }
    }

    /// Parses a level name, case-insensitively.
    ///
    /// Unknown names yield `None` instead of an error, so configuration taken from the
    /// environment can fall back to a default rather than abort.
    ///
    /// ```
    /// use modlog::Level;
    ///
    /// assert_eq!(Level::parse_lossy("Warn"), Some(Level::Warning));
    /// assert_eq!(Level::parse_lossy("verbose"), None);
    /// ```
    pub fn parse_lossy(name: &str) -> Option<Self> {
        let name = name.trim();
        let level = if name.eq_ignore_ascii_case("trace") {
            Self::Trace
        } else if name.eq_ignore_ascii_case("debug") {
            Self::Debug
        } else if name.eq_ignore_ascii_case("info") {
            Self::Info
        } else if name.eq_ignore_ascii_case("warn") || name.eq_ignore_ascii_case("warning") {
            Self::Warning
        } else if name.eq_ignore_ascii_case("error") || name.eq_ignore_ascii_case("err") {
            Self::Error
        } else if name.eq_ignore_ascii_case("panic") || name.eq_ignore_ascii_case("fatal") {
            Self::Panic
        } else {
            return None;
        };
        Some(level)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Trace => 1,
            Self::Debug => 2,
            Self::Info => 3,
            Self::Warning => 4,
            Self::Error => 5,
            Self::Panic => 6,
        }
    }

    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Trace),
            2 => Some(Self::Debug),
            3 => Some(Self::Info),
            4 => Some(Self::Warning),
            5 => Some(Self::Error),
            6 => Some(Self::Panic),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Level`] from an unknown name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lossy(s).ok_or_else(|| ParseLevelError(s.to_owned()))
    }
}

/// A level stored in an atomic, used for a logger's minimum level.
#[derive(Debug)]
pub(crate) struct AtomicLevel(AtomicU8);

impl AtomicLevel {
    pub(crate) fn new(level: Level) -> Self {
        Self(AtomicU8::new(level.to_u8()))
    }

    pub(crate) fn load(&self) -> Level {
        Level::from_u8(self.0.load(Ordering::Relaxed)).unwrap_or(Level::Info)
    }

    pub(crate) fn store(&self, level: Level) {
        self.0.store(level.to_u8(), Ordering::Relaxed);
    }
}

/// A slot holding an optional minimum level that supersedes the minimum level of every logger
/// observing it.
///
/// Reads and writes are single atomic operations, so the slot can be changed at any time from
/// any thread. Loggers observe the slot passed in their [`Options`](crate::Options), which is
/// [`LevelOverride::global`] unless configured otherwise.
#[derive(Debug, Default)]
pub struct LevelOverride(AtomicU8);

static GLOBAL_OVERRIDE: LazyLock<Arc<LevelOverride>> =
    LazyLock::new(|| Arc::new(LevelOverride::default()));

impl LevelOverride {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Returns the process-wide slot.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_OVERRIDE)
    }

    /// Returns the current override, if any.
    pub fn get(&self) -> Option<Level> {
        Level::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Sets or clears the override.
    pub fn set(&self, level: Option<Level>) {
        self.0
            .store(level.map_or(0, Level::to_u8), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered_by_severity() {
        for pair in Level::ALL.windows(2) {
            if let [lower, higher] = pair {
                assert!(lower < higher, "{lower} should be below {higher}");
            }
        }
    }

    #[test]
    fn labels_are_fixed_uppercase_strings() {
        let labels: Vec<_> = Level::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "PANIC"]);
    }

    #[test]
    fn parsing_is_case_insensitive_and_never_fails() {
        assert_eq!(Level::parse_lossy("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse_lossy(" warning "), Some(Level::Warning));
        assert_eq!(Level::parse_lossy("Fatal"), Some(Level::Panic));
        assert_eq!(Level::parse_lossy(""), None);
        assert_eq!(Level::parse_lossy("loud"), None);

        assert_eq!("err".parse::<Level>(), Ok(Level::Error));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn override_slot_round_trips_every_level() {
        let slot = LevelOverride::new();
        assert_eq!(slot.get(), None);

        for level in Level::ALL {
            slot.set(Some(level));
            assert_eq!(slot.get(), Some(level));
        }

        slot.set(None);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn styles_differ_between_levels() {
        assert_ne!(Level::Info.style(), Level::Error.style());
        assert_ne!(Level::Warning.style(), Level::Debug.style());
    }
}
