//! Serialization of [`Record`]s into bytes.

mod console;
mod json;

use std::fmt;

pub use self::{
    console::{ConsoleEncoder, ConsoleEncoderConfig},
    json::{JsonEncoder, JsonEncoderConfig},
};
use crate::Record;

/// Turns a [`Record`] into the bytes written to a [`Sink`](crate::Sink).
///
/// Implementations append one complete record (including its line ending) to `buffer`.
/// On error the pipeline discards the whole buffer, so partially written output never reaches
/// the sink.
pub trait Encoder: Send + Sync + fmt::Debug {
    /// Appends the encoded form of `record` to `buffer`.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the record cannot be serialized.
    fn encode(&self, record: &Record<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError>;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&self, record: &Record<'_>, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        (**self).encode(record, buffer)
    }
}

/// Errors raised while encoding a record.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text formatting failed.
    #[error("formatting error: {0}")]
    Format(#[from] fmt::Error),

    /// A field value could not be encoded.
    #[error("field `{key}` could not be encoded: {reason}")]
    Field {
        /// Key of the offending field.
        key: String,

        /// Why the value was rejected.
        reason: String,
    },
}
