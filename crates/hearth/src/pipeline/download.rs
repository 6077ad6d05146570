//! Bounded download and parse of located objects.
//!
//! Objects are fetched and decoded with at most `max_in_flight` in progress.
//! Completion order is discarded: results come back sorted by object key so
//! everything downstream is deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use indexmap::IndexMap;
use tracing::debug;

use hearth_core::StorageProviderRef;
use hearth_core::emit;
use hearth_core::metrics::events::ActiveDownloads;

use crate::config::DatasetKey;
use crate::error::PipelineError;
use crate::source::{ObjectRef, ParsedObject, RecordParser};

/// One object's parse outcome, tagged with its dataset.
#[derive(Debug)]
pub(super) struct Downloaded {
    pub dataset: DatasetKey,
    pub object: ObjectRef,
    pub result: Result<ParsedObject, PipelineError>,
}

pub(super) struct Downloader {
    storage: StorageProviderRef,
    max_in_flight: usize,
}

impl Downloader {
    pub fn new(storage: StorageProviderRef, max_in_flight: usize) -> Self {
        Self {
            storage,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Fetch and parse every assigned object.
    ///
    /// Errors are kept per object; the caller decides which one wins.
    pub async fn run(
        &self,
        assigned: &IndexMap<DatasetKey, Vec<ObjectRef>>,
        parsers: &IndexMap<DatasetKey, Arc<RecordParser>>,
    ) -> Vec<Downloaded> {
        let jobs: Vec<(DatasetKey, ObjectRef, Arc<RecordParser>)> = assigned
            .iter()
            .filter_map(|(key, objects)| parsers.get(key).map(|parser| (key, objects, parser)))
            .flat_map(|(key, objects, parser)| {
                objects
                    .iter()
                    .map(move |object| (key.clone(), object.clone(), Arc::clone(parser)))
            })
            .collect();

        let active = AtomicUsize::new(0);
        let active = &active;
        let storage = &self.storage;

        let mut downloaded: Vec<Downloaded> = futures::stream::iter(jobs)
            .map(|(dataset, object, parser)| async move {
                emit!(ActiveDownloads {
                    count: active.fetch_add(1, Ordering::Relaxed) + 1,
                });
                let fetched = storage.get(object.key.as_str()).await;
                emit!(ActiveDownloads {
                    count: active.fetch_sub(1, Ordering::Relaxed) - 1,
                });

                let result = match fetched {
                    Ok(bytes) => {
                        debug!(target = %dataset, key = %object.key, bytes = bytes.len(), "Downloaded object");
                        parser.parse(&object, &bytes).map_err(PipelineError::from)
                    }
                    Err(e) => Err(PipelineError::from(e)),
                };

                Downloaded {
                    dataset,
                    object,
                    result,
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        downloaded.sort_by(|a, b| a.object.key.cmp(&b.object.key));
        downloaded
    }
}
