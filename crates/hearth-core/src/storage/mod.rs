//! Object store abstraction.
//!
//! Provides a unified, read-mostly interface over S3, the local filesystem and
//! an in-memory store. Every call is bounded by the provider's timeout when
//! one is configured.

mod local;
mod prefix;
mod s3;
mod url_parser;

pub use local::LocalConfig;
pub use prefix::DatePrefixGenerator;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError, TimeoutSnafu};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Metadata for one listed object, with its path relative to the provider root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Storage provider that abstracts over different object store backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
    pub(crate) timeout: Option<Duration>,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options, timeout),
            BackendConfig::Local(config) => Self::construct_local(config, timeout).await,
            BackendConfig::Memory { key } => Ok(Self::construct_memory(key, timeout)),
        }
    }

    /// Canonical URL of the provider root (for logging).
    pub fn url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// List every object under `prefix` (relative to the configured root).
    ///
    /// Returned paths are relative to the root and sorted lexically. A prefix
    /// that does not exist yields an empty list.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let full_prefix: Path = match self.config.key() {
            Some(key) => key.parts().chain(Path::from(prefix).parts()).collect(),
            None => Path::from(prefix),
        };
        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let listing = async {
            self.object_store
                .list(Some(&full_prefix))
                .map_ok(|meta| ObjectEntry {
                    path: meta.location.parts().skip(key_part_count).collect::<Path>().to_string(),
                    size: meta.size,
                    last_modified: meta.last_modified,
                })
                .try_collect::<Vec<_>>()
                .await
        };

        let result = self.instrumented(StorageOperation::List, listing).await;
        let mut entries = match result {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!(prefix = %prefix, "Prefix not found, treating as empty");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            prefix = %prefix,
            count = entries.len(),
            "Listed objects under prefix"
        );
        Ok(entries)
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let qualified = self.qualify_path(&path).into_owned();
        let fetch = async {
            self.object_store.get(&qualified).await?.bytes().await
        };
        self.instrumented(StorageOperation::Get, fetch).await
    }

    /// Put a payload to a path.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let qualified = self.qualify_path(path).into_owned();
        let put = async { self.object_store.put(&qualified, payload).await.map(|_| ()) };
        self.instrumented(StorageOperation::Put, put).await
    }

    /// Put raw bytes to a path.
    pub async fn put(&self, path: impl Into<Path>, bytes: impl Into<Bytes>) -> Result<(), StorageError> {
        let path = path.into();
        self.put_payload(&path, PutPayload::from(bytes.into())).await
    }

    /// Run one store call with timeout, request metrics and error mapping.
    async fn instrumented<T, F>(
        &self,
        operation: StorageOperation,
        future: F,
    ) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, object_store::Error>>,
    {
        let start = Instant::now();
        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, future).await {
                Ok(result) => result.context(ObjectStoreSnafu),
                Err(_) => TimeoutSnafu {
                    operation: operation.as_str(),
                    secs: timeout.as_secs(),
                }
                .fail(),
            },
            None => future.await.context(ObjectStoreSnafu),
        };

        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(StorageRequest { operation, status });
        emit!(StorageRequestDuration {
            operation,
            duration: start.elapsed(),
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_returns_sorted_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        let partition = base_path.join("real_estate/cost_of_living/2023-03-17");
        std::fs::create_dir_all(&partition).unwrap();
        std::fs::write(partition.join("living_wage.csv"), b"a,b\n1,2\n").unwrap();
        std::fs::write(partition.join("expenses.csv"), b"a\n1\n").unwrap();

        let storage = StorageProvider::for_url_with_options(
            base_path.to_str().unwrap(),
            HashMap::new(),
            None,
        )
        .await
        .unwrap();

        let entries = storage
            .list_objects("real_estate/cost_of_living/2023-03-17")
            .await
            .unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "real_estate/cost_of_living/2023-03-17/expenses.csv",
                "real_estate/cost_of_living/2023-03-17/living_wage.csv",
            ]
        );
        assert_eq!(entries[0].size, 4);

        // Listed paths can be fed straight back into get()
        let content = storage.get(entries[1].path.as_str()).await.unwrap();
        assert_eq!(content.as_ref(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_missing_prefix_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageProvider::for_url_with_options(
            temp_dir.path().to_str().unwrap(),
            HashMap::new(),
            None,
        )
        .await
        .unwrap();

        let entries = storage.list_objects("does/not/exist").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_memory_key_prefix_is_stripped() {
        let storage = StorageProvider::for_url_with_options("memory://raw", HashMap::new(), None)
            .await
            .unwrap();
        storage.put("2023-03-17/a.csv", b"x".to_vec()).await.unwrap();
        storage.put("2023-03-18/b.csv", b"y".to_vec()).await.unwrap();

        let entries = storage.list_objects("2023-03-17").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "2023-03-17/a.csv");
        assert_eq!(storage.get("2023-03-17/a.csv").await.unwrap().as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let storage = StorageProvider::in_memory();
        let err = storage.get("nope.csv").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
