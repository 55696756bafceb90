//! Object storage trait.
//!
//! Abstract interface over bucket-shaped blob storage. Implementations wrap
//! a concrete backend; the in-memory implementation in
//! [`stores::memory`](crate::stores::memory) backs tests and local runs.

use async_trait::async_trait;

use crate::error::Result;

/// Bucket-addressed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes.
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Write an object; returns its URI.
    async fn write(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String>;

    /// Copy an object between buckets; returns the destination URI.
    async fn copy(
        &self,
        source_bucket: &str,
        source_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> Result<String>;

    /// Check whether an object exists.
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool>;
}

#[async_trait]
impl<T> ObjectStore for std::sync::Arc<T>
where
    T: ObjectStore + ?Sized,
{
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        (**self).read(bucket, path).await
    }

    async fn write(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String> {
        (**self).write(bucket, path, data, content_type).await
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> Result<String> {
        (**self)
            .copy(source_bucket, source_path, dest_bucket, dest_path)
            .await
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        (**self).exists(bucket, path).await
    }
}

/// Split a `scheme://bucket/path` or `bucket/path` reference into
/// `(bucket, path)`.
pub fn split_object_uri(uri: &str) -> Option<(&str, &str)> {
    let without_scheme = match uri.find("://") {
        Some(idx) => &uri[idx + 3..],
        None => uri,
    };
    let (bucket, path) = without_scheme.split_once('/')?;
    if bucket.is_empty() || path.is_empty() {
        return None;
    }
    Some((bucket, path))
}
