//! Severity ordering and the shared, runtime-mutable level threshold.

use std::{
    fmt,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use serde::{Deserialize, Serialize};

/// Importance of a log record.
///
/// The variants are ordered: `Trace < Debug < Info < Notice < Warn < Error`.
/// A record is written iff its severity is greater than or equal to the current threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Very fine-grained diagnostic information.
    Trace,

    /// Diagnostic information useful while developing.
    Debug,

    /// Routine operational information.
    Info,

    /// Normal but significant conditions.
    Notice,

    /// Potentially harmful situations.
    Warn,

    /// Failures that need attention.
    Error,
}

impl Severity {
    /// All severities, in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warn,
        Self::Error,
    ];

    /// Lowercase name, as written by the JSON encoder.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Uppercase name, as written by the console encoder.
    pub fn as_upper_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    fn from_repr(repr: u8) -> Self {
        match repr {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Notice,
            4 => Self::Warn,
            _ => Self::Error,
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => 0,
            Severity::Debug => 1,
            Severity::Info => 2,
            Severity::Notice => 3,
            Severity::Warn => 4,
            Severity::Error => 5,
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Severity`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown log severity `{0}`, expected one of trace, debug, info, notice, warn, error")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|severity| trimmed.eq_ignore_ascii_case(severity.as_str()))
            .or_else(|| trimmed.eq_ignore_ascii_case("warning").then_some(Self::Warn))
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}

/// The level controller: a minimum severity shared by reference.
///
/// Cloning an [`AtomicLevel`] yields a handle to the *same* threshold, so a change made through
/// any clone is observed by every logger holding it on its next call.
#[derive(Clone, Debug)]
pub struct AtomicLevel {
    threshold: Arc<AtomicU8>,
}

impl AtomicLevel {
    /// Creates a new threshold set to `severity`.
    pub fn new(severity: Severity) -> Self {
        Self {
            threshold: Arc::new(AtomicU8::new(u8::from(severity))),
        }
    }

    /// Returns the current threshold.
    pub fn get(&self) -> Severity {
        Severity::from_repr(self.threshold.load(Ordering::Relaxed))
    }

    /// Replaces the threshold. Takes effect for every subsequent check.
    pub fn set(&self, severity: Severity) {
        self.threshold.store(u8::from(severity), Ordering::Relaxed);
    }

    /// Whether a record of `severity` passes the current threshold.
    #[inline]
    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.get()
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}
