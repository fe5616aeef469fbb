//! Human-readable, tab-separated encoder.

use std::fmt::Write as _;

use colored::{Color, Colorize};
use time::format_description::well_known::Iso8601;

use super::{EncodeError, Encoder};
use crate::{Record, Severity};

/// Width of the level column; the longest severity name is `NOTICE`.
const LEVEL_WIDTH: usize = 6;

/// Configuration for creating a [`ConsoleEncoder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleEncoderConfig {
    /// Colour the level column. Colours are only emitted when the `colored` crate decides the
    /// output supports them (`NO_COLOR`, `CLICOLOR` and `CLICOLOR_FORCE` are honoured).
    pub colorize: bool,
}

/// An [`Encoder`] producing lines such as
///
/// ```text
/// 2025-01-01T00:00:00.000000000Z	ERROR 	src/main.rs:10	disk low	{"pct":5}
/// ```
///
/// Columns are separated by tabs: timestamp, upper-case level padded to a fixed width, caller
/// (when captured), message, and the fields as a JSON object (when non-empty). A captured stack
/// trace follows on the next lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleEncoder {
    config: ConsoleEncoderConfig,
}

impl ConsoleEncoder {
    /// Creates a new [`ConsoleEncoder`].
    pub fn new(config: ConsoleEncoderConfig) -> Self {
        Self { config }
    }

    fn level_color(severity: Severity) -> Color {
        match severity {
            Severity::Trace => Color::Magenta,
            Severity::Debug => Color::Blue,
            Severity::Info => Color::Green,
            Severity::Notice => Color::Cyan,
            Severity::Warn => Color::Yellow,
            Severity::Error => Color::Red,
        }
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&self, record: &Record<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut line = String::with_capacity(128);

        if let Ok(time) = record.timestamp.format(&Iso8601::DEFAULT) {
            line.push_str(&time);
            line.push('\t');
        }

        let level = format!("{:<LEVEL_WIDTH$}", record.severity.as_upper_str());
        if self.config.colorize {
            write!(line, "{}", level.color(Self::level_color(record.severity)))?;
        } else {
            line.push_str(&level);
        }

        if let Some(caller) = &record.caller {
            write!(line, "\t{caller}")?;
        }

        write!(line, "\t{}", record.message)?;

        if !record.fields.is_empty() {
            line.push('\t');
            line.push_str(&serde_json::to_string(&record.fields)?);
        }

        if let Some(stacktrace) = &record.stacktrace {
            line.push('\n');
            line.push_str(stacktrace.trim_end());
        }

        line.push('\n');
        buffer.extend_from_slice(line.as_bytes());
        Ok(())
    }
}
