use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::{BodyReader, ByteRange, ObjectBody, ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, mut body: BodyReader) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        let mut file = tokio::fs::File::create(&path).await?;
        tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<ObjectBody, ObjectStoreError> {
        let path = self.object_path(key);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        let mut file = tokio::fs::File::open(&path).await?;
        let total_size = file.metadata().await?.len();

        let reader: BodyReader = match range {
            Some(window) => {
                if window.start >= total_size {
                    return Err(ObjectStoreError::RangeNotSatisfiable(format!(
                        "start {} is beyond object of {} bytes",
                        window.start, total_size
                    )));
                }
                let end = window.end.min(total_size - 1);
                file.seek(std::io::SeekFrom::Start(window.start)).await?;
                Box::new(file.take(end - window.start + 1))
            }
            None => Box::new(file),
        };

        Ok(ObjectBody { reader, total_size })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key);
        Ok(path.exists())
    }
}
