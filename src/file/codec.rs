//! Entry Codecs
//!
//! On-disk record formats for the file backend.
//!
//! - [`TextCodec`]: `"{expiry}\n{payload}"`. The first line is `0` (never
//!   expires) or a Unix timestamp; everything after the first newline is the
//!   payload, byte for byte.
//! - [`LiteralCodec`]: a self-describing literal document
//!   `{"lifetime":<expiry>,"data":<payload>}` loaded by deserializing the
//!   whole file. The payload is embedded verbatim as a JSON literal, so only
//!   payloads that are valid JSON can be stored.

use std::io::{BufRead, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::cache::{Entry, Expiry};
use crate::error::{Error, Result};

/// Serialization of an [`Entry`] into a file body
pub trait EntryCodec: Send + Sync + 'static {
    /// Codec name for logs
    fn name(&self) -> &'static str;

    /// Extension used when the configuration does not set one
    fn default_extension(&self) -> &'static str;

    /// Render an entry, rejecting payloads the format cannot hold
    fn encode(&self, entry: &Entry) -> Result<Vec<u8>>;

    /// Parse a full record
    fn decode(&self, path: &Path, reader: &mut dyn BufRead) -> Result<Entry>;

    /// Parse only as much of a record as needed to learn its expiry
    fn decode_expiry(&self, path: &Path, reader: &mut dyn BufRead) -> Result<Expiry> {
        Ok(self.decode(path, reader)?.expiry)
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::CorruptEntry {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// =============================================================================
// Text-framed codec
// =============================================================================

/// Expiry line followed by the raw payload
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl TextCodec {
    fn read_expiry_line(path: &Path, reader: &mut dyn BufRead) -> Result<Expiry> {
        let mut line = Vec::with_capacity(16);
        reader.read_until(b'\n', &mut line)?;

        if line.pop() != Some(b'\n') {
            return Err(corrupt(path, "missing expiry line"));
        }

        let text = std::str::from_utf8(&line).map_err(|_| corrupt(path, "expiry is not UTF-8"))?;
        let marker = text
            .trim()
            .parse::<i64>()
            .map_err(|_| corrupt(path, format!("invalid expiry marker {text:?}")))?;
        Ok(Expiry::from_marker(marker))
    }
}

impl EntryCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn default_extension(&self) -> &'static str {
        ".cache"
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        let header = format!("{}\n", entry.expiry.marker());
        let mut body = Vec::with_capacity(header.len() + entry.payload.len());
        body.extend_from_slice(header.as_bytes());
        body.extend_from_slice(&entry.payload);
        Ok(body)
    }

    fn decode(&self, path: &Path, reader: &mut dyn BufRead) -> Result<Entry> {
        let expiry = Self::read_expiry_line(path, reader)?;
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok(Entry {
            expiry,
            payload: payload.into(),
        })
    }

    fn decode_expiry(&self, path: &Path, reader: &mut dyn BufRead) -> Result<Expiry> {
        Self::read_expiry_line(path, reader)
    }
}

// =============================================================================
// Self-describing literal codec
// =============================================================================

#[derive(Serialize)]
struct LiteralRef<'a> {
    lifetime: i64,
    data: &'a RawValue,
}

#[derive(Deserialize)]
struct LiteralOwned {
    lifetime: i64,
    data: Box<RawValue>,
}

/// Whole-record literal document; payloads must be JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralCodec;

impl LiteralCodec {
    /// Check that a payload can be embedded as a literal
    pub fn validate(payload: &[u8]) -> Result<()> {
        Self::as_literal(payload).map(|_| ())
    }

    fn as_literal(payload: &[u8]) -> Result<&RawValue> {
        let text = std::str::from_utf8(payload).map_err(|_| {
            Error::UnsupportedPayload("literal entries require UTF-8 JSON payloads".into())
        })?;
        let raw = serde_json::from_str::<&RawValue>(text).map_err(|e| {
            Error::UnsupportedPayload(format!("payload is not a JSON literal: {e}"))
        })?;

        // The parser skips surrounding whitespace, which would not survive a read
        if raw.get().len() != text.len() {
            return Err(Error::UnsupportedPayload(
                "literal payloads must not carry surrounding whitespace".into(),
            ));
        }
        Ok(raw)
    }
}

impl EntryCodec for LiteralCodec {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn default_extension(&self) -> &'static str {
        ".json"
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>> {
        let data = Self::as_literal(&entry.payload)?;
        let document = LiteralRef {
            lifetime: entry.expiry.marker(),
            data,
        };
        Ok(serde_json::to_vec(&document)?)
    }

    fn decode(&self, path: &Path, reader: &mut dyn BufRead) -> Result<Entry> {
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;

        let document: LiteralOwned = serde_json::from_slice(&body)
            .map_err(|e| corrupt(path, format!("invalid literal document: {e}")))?;
        let payload = document.data.get().as_bytes().to_vec();

        Ok(Entry {
            expiry: Expiry::from_marker(document.lifetime),
            payload: payload.into(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
