//! Object locator: lists the partition for one extract date.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use tracing::{debug, info};

use hearth_core::emit;
use hearth_core::metrics::events::ObjectsLocated;
use hearth_core::storage::{DatePrefixGenerator, ObjectEntry, StorageProviderRef};

use crate::config::{Config, DatasetKey};
use crate::error::StorageError;

/// A located source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Key relative to the source root.
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectEntry> for ObjectRef {
    fn from(entry: ObjectEntry) -> Self {
        Self {
            key: entry.path,
            size: entry.size,
            last_modified: entry.last_modified,
        }
    }
}

/// Lists the objects that belong to a given date.
#[derive(Debug, Clone)]
pub struct ObjectLocator {
    storage: StorageProviderRef,
    prefix: DatePrefixGenerator,
}

impl ObjectLocator {
    pub fn new(storage: StorageProviderRef, prefix_template: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: DatePrefixGenerator::new(prefix_template),
        }
    }

    /// Every object under the date's prefix, sorted by key.
    ///
    /// An empty list is a valid outcome.
    pub async fn locate(&self, date: NaiveDate) -> Result<Vec<ObjectRef>, StorageError> {
        let prefix = self.prefix.prefix_for(date)?;
        debug!(%date, prefix = %prefix, url = %self.storage.url(), "Listing source partition");

        let objects: Vec<ObjectRef> = self
            .storage
            .list_objects(&prefix)
            .await?
            .into_iter()
            .map(ObjectRef::from)
            .collect();

        emit!(ObjectsLocated {
            count: objects.len() as u64,
        });
        info!(%date, prefix = %prefix, count = objects.len(), "Located source objects");
        Ok(objects)
    }
}

/// Assign located objects to the datasets that claim them.
///
/// Every dataset appears in the result, in configuration order, possibly with
/// no objects. An object is claimed by the first matching dataset; objects no
/// dataset claims are ignored.
pub fn assign_objects(config: &Config, objects: &[ObjectRef]) -> IndexMap<DatasetKey, Vec<ObjectRef>> {
    let mut assigned: IndexMap<DatasetKey, Vec<ObjectRef>> = config
        .datasets()
        .map(|(key, _)| (key.clone(), Vec::new()))
        .collect();

    for object in objects {
        let owner = config
            .datasets()
            .find(|(key, dataset)| dataset.claims(key, &object.key))
            .map(|(key, _)| key);

        match owner.and_then(|key| assigned.get_mut(key)) {
            Some(bucket) => bucket.push(object.clone()),
            None => debug!(key = %object.key, "Object not claimed by any dataset, ignoring"),
        }
    }

    assigned
}
