//! Machine-readable encoder producing one JSON object per record.

use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde_json::{
    Value,
    ser::{CompactFormatter, Formatter},
};
use time::format_description::well_known::Iso8601;

use super::{EncodeError, Encoder};
use crate::{LoggerError, Record, keys};

/// Configuration for creating a [`JsonEncoder`].
#[derive(Clone, Debug, Default)]
pub struct JsonEncoderConfig {
    /// A map of key-value pairs that are statically defined at initialization and included at
    /// the top level of every record.
    pub static_fields: HashMap<String, Value>,

    /// If `true`, every record carries the `hostname` and `pid` of the current process.
    pub include_process_info: bool,
}

/// An [`Encoder`] that writes each record as a single JSON object followed by a newline.
///
/// Implicit keys (`ts`, `level`, `caller`, `msg`, `stacktrace`, and `hostname` / `pid` when
/// enabled) are written first, followed by the static fields and then the record's own fields.
/// A record field is skipped only when the encoder writes the same key for that record.
///
/// The [`serde_json::ser::Formatter`] controls the output style; the default
/// [`CompactFormatter`] keeps one record per line.
#[derive(Clone, Debug)]
pub struct JsonEncoder<F = CompactFormatter>
where
    F: Formatter + Clone,
{
    formatter: F,
    process: Option<ProcessInfo>,
    static_fields: Vec<(String, Value)>,
}

#[derive(Clone, Debug)]
struct ProcessInfo {
    hostname: String,
    pid: u32,
}

impl JsonEncoder {
    /// A compact encoder with no static fields.
    pub fn compact() -> Self {
        Self {
            formatter: CompactFormatter,
            process: None,
            static_fields: Vec::new(),
        }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::compact()
    }
}

impl<F> JsonEncoder<F>
where
    F: Formatter + Clone,
{
    /// Creates a new [`JsonEncoder`] with the specified configuration and formatter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Configuration`] if a static field uses a reserved key.
    pub fn new(config: JsonEncoderConfig, formatter: F) -> Result<Self, LoggerError> {
        for key in config.static_fields.keys() {
            if keys::IMPLICIT_KEYS.contains(key.as_str()) {
                return Err(LoggerError::Configuration(format!(
                    "A reserved key `{key}` was included in `static_fields` of the JSON encoder"
                )));
            }
        }

        let process = config.include_process_info.then(|| ProcessInfo {
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
        });

        let mut static_fields: Vec<(String, Value)> = config.static_fields.into_iter().collect();
        static_fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(Self {
            formatter,
            process,
            static_fields,
        })
    }

    /// Serializes implicit fields.
    fn serialize_implicit_fields(
        &self,
        map_serializer: &mut impl SerializeMap<Error = serde_json::Error>,
        record: &Record<'_>,
    ) -> Result<(), EncodeError> {
        if let Ok(time) = record.timestamp.format(&Iso8601::DEFAULT) {
            map_serializer.serialize_entry(keys::TIME, &time)?;
        }
        map_serializer.serialize_entry(keys::LEVEL, record.severity.as_str())?;
        if let Some(caller) = &record.caller {
            map_serializer.serialize_entry(keys::CALLER, &format_args!("{caller}"))?;
        }
        map_serializer.serialize_entry(keys::MESSAGE, &record.message)?;

        if let Some(process) = &self.process {
            map_serializer.serialize_entry(keys::HOSTNAME, &process.hostname)?;
            map_serializer.serialize_entry(keys::PID, &process.pid)?;
        }

        Ok(())
    }

    /// Whether `key` is written by the encoder itself for `record`.
    fn writes_key(&self, record: &Record<'_>, key: &str) -> bool {
        match key {
            keys::TIME | keys::LEVEL | keys::MESSAGE => true,
            keys::CALLER => record.caller.is_some(),
            keys::STACKTRACE => record.stacktrace.is_some(),
            keys::HOSTNAME | keys::PID => self.process.is_some(),
            _ => false,
        }
    }
}

impl<F> Encoder for JsonEncoder<F>
where
    F: Formatter + Clone + Send + Sync + std::fmt::Debug,
{
    fn encode(&self, record: &Record<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        let start = buffer.len();
        let result = (|| {
            let mut serializer =
                serde_json::Serializer::with_formatter(&mut *buffer, self.formatter.clone());
            let mut map_serializer = serializer.serialize_map(None)?;

            self.serialize_implicit_fields(&mut map_serializer, record)?;

            for (key, value) in &self.static_fields {
                if !record.fields.contains_key(key) {
                    map_serializer.serialize_entry(key, value)?;
                }
            }

            for (key, value) in &record.fields {
                if !self.writes_key(record, key) {
                    map_serializer.serialize_entry(key, value)?;
                }
            }

            if let Some(stacktrace) = &record.stacktrace {
                map_serializer.serialize_entry(keys::STACKTRACE, stacktrace)?;
            }

            map_serializer.end()?;
            Ok::<(), EncodeError>(())
        })();

        match result {
            Ok(()) => {
                buffer.push(b'\n');
                Ok(())
            }
            Err(error) => {
                buffer.truncate(start);
                Err(error)
            }
        }
    }
}
