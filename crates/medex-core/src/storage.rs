use async_trait::async_trait;

use crate::document::OutputArtifact;
use crate::error::{MedexError, Result};

/// A key-addressed blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` in the default bucket and returns its `gs://` URI.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<OutputArtifact>>;

    async fn download(&self, artifact: &OutputArtifact) -> Result<Vec<u8>>;

    async fn delete(&self, artifact: &OutputArtifact) -> Result<()>;
}

/// A `gs://bucket/prefix` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub prefix: String,
}

impl StorageLocation {
    pub fn parse(uri: &str) -> Result<Self> {
        let unparseable = || MedexError::OutputLocationUnparseable(uri.to_string());

        let rest = uri.strip_prefix("gs://").ok_or_else(unparseable)?;
        // A bucket with no path separator at all is not a location.
        let (bucket, prefix) = rest.split_once('/').ok_or_else(unparseable)?;
        if bucket.is_empty() {
            return Err(unparseable());
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix)
    }
}
