//! Local filesystem and in-memory backends.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// Local filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
}

impl StorageProvider {
    pub(super) async fn construct_local(
        config: LocalConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?);

        let canonical_url = format!("file://{}", config.path);

        Ok(Self {
            config: BackendConfig::Local(config),
            object_store,
            canonical_url,
            timeout,
        })
    }

    /// Create a provider backed by a fresh in-memory store.
    ///
    /// Used by tests and dry runs; contents live only as long as the provider.
    pub fn in_memory() -> Self {
        Self::construct_memory(None, None)
    }

    pub(super) fn construct_memory(key: Option<Path>, timeout: Option<Duration>) -> Self {
        let canonical_url = match &key {
            Some(key) => format!("memory://{key}"),
            None => "memory://".to_string(),
        };

        Self {
            config: BackendConfig::Memory { key },
            object_store: Arc::new(InMemory::new()),
            canonical_url,
            timeout,
        }
    }
}
