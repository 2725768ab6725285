//! Streaming protocol adapter.
//!
//! Translates a byte-range request into a bounded window against the object
//! storage backend and produces the partial-content framing for it. Only
//! audio and video content (inferred from the storage key's extension) is
//! streamable; everything else goes through the full download path.

use crate::error::{Error, Result};
use crate::object_store::{BodyReader, ByteRange};

/// Fixed size of a single streamed window.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// A resolved byte-range stream ready for partial-content framing.
pub struct FileStream {
    pub mime: String,
    /// Full size of the stored object.
    pub total_size: u64,
    /// The byte window actually served, inclusive on both ends.
    pub window: ByteRange,
    pub body: BodyReader,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("mime", &self.mime)
            .field("total_size", &self.total_size)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl FileStream {
    /// Partial-content framing value: `bytes {start}-{end}/{total}`.
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.window.start, self.window.end, self.total_size
        )
    }

    /// Declared length for the response: the total object size.
    pub fn declared_length(&self) -> u64 {
        self.total_size
    }
}

/// File-extension suffix of a storage key, if it has one.
pub fn extension(storage_key: &str) -> Option<&str> {
    let (stem, ext) = storage_key.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

/// MIME type for a storage key, or None when undeterminable.
pub fn resolve_mime(storage_key: &str) -> Option<String> {
    let ext = extension(storage_key)?;
    mime_guess::from_ext(ext).first().map(|m| m.to_string())
}

/// MIME type for a key that must be streamable (audio or video).
pub fn streamable_mime(storage_key: &str) -> Result<String> {
    let mime = resolve_mime(storage_key)
        .ok_or_else(|| Error::invalid("This file cannot be streamed."))?;
    let primary = mime.split('/').next().unwrap_or("");
    if primary == "audio" || primary == "video" {
        Ok(mime)
    } else {
        Err(Error::invalid("This file cannot be streamed."))
    }
}

/// Parse the numeric start offset out of a range request value.
///
/// Only a single start offset is supported (no multi-range, no suffix
/// ranges); every non-digit character is ignored, so `bytes=500-` parses as
/// 500. An absent value means start from the beginning; a value with no
/// digits at all, or one too large for u64, is malformed.
pub fn parse_range_start(range: Option<&str>) -> Result<u64> {
    let raw = match range {
        Some(value) => value,
        None => return Ok(0),
    };

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(Error::invalid(format!("Malformed range '{raw}'.")));
    }
    digits
        .parse::<u64>()
        .map_err(|_| Error::invalid(format!("Malformed range '{raw}'.")))
}

/// The window the backend should serve for a given start offset, before the
/// total size is known: clamping to the object happens backend-side and in
/// [`clamp_window`].
pub fn requested_window(start: u64) -> ByteRange {
    ByteRange {
        start,
        end: start.saturating_add(CHUNK_SIZE - 1),
    }
}

/// Final served window: `end = min(start + CHUNK_SIZE - 1, total - 1)`.
pub fn clamp_window(start: u64, total_size: u64) -> Result<ByteRange> {
    if total_size == 0 || start >= total_size {
        return Err(Error::invalid(format!(
            "Range start {start} is beyond the object's {total_size} bytes."
        )));
    }
    Ok(ByteRange {
        start,
        end: start.saturating_add(CHUNK_SIZE - 1).min(total_size - 1),
    })
}
