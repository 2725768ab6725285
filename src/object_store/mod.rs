mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Streaming body for uploads and downloads. Bytes move through this reader
/// in pipeline-sized buffers; no path buffers a whole object in memory.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// Inclusive byte window within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the window covers.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// An open download: the (possibly bounded) bytes plus the full object size.
pub struct ObjectBody {
    pub reader: BodyReader,
    /// Total size of the stored object, regardless of any requested range.
    pub total_size: u64,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

/// Abstraction over object storage backends.
/// Keys are orchestrator-assigned locators -- the raw blobs are meaningless
/// without the metadata store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` to the backend under `key`, overwriting any existing
    /// object. Returns only after the write is durable.
    async fn put(&self, key: &str, body: BodyReader) -> Result<(), ObjectStoreError>;

    /// Open the object for reading, bounded to `range` when given. A range
    /// reaching past the last byte is clamped; a range starting past it is
    /// `RangeNotSatisfiable`.
    async fn get(&self, key: &str, range: Option<ByteRange>)
        -> Result<ObjectBody, ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}
