//! Streaming gzip filter for the upload pipeline.
//!
//! Compression happens inside the same streaming pipeline that feeds the
//! object storage backend, so peak memory stays bounded by the pipeline's
//! buffer size rather than the object size.

use async_compression::tokio::bufread::GzipEncoder;
use tokio::io::BufReader;

use crate::object_store::BodyReader;

/// Suffix appended to storage keys whose bytes were gzip-compressed on upload.
pub const GZIP_SUFFIX: &str = ".gz";

/// Wrap `body` in a streaming gzip encoder.
pub fn gzip(body: BodyReader) -> BodyReader {
    Box::new(GzipEncoder::new(BufReader::new(body)))
}

/// Apply the compression filter when requested, pass through otherwise.
pub fn apply(body: BodyReader, compress: bool) -> BodyReader {
    if compress {
        gzip(body)
    } else {
        body
    }
}

/// Whether a storage key marks its blob as compressed.
pub fn is_compressed(storage_key: &str) -> bool {
    storage_key.ends_with(GZIP_SUFFIX)
}
