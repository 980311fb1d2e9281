//! Experiment store — discovered records shared between the watcher and
//! the scrape endpoint.
//!
//! Records are published whole: the watcher enriches a record before
//! inserting it, and readers receive `Arc` handles, so a scrape sees either
//! the previous or the new record set and never a half-filled record.
//! Lock sections are a lookup, an insert, or cloning the `Arc`s out.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::record::ExperimentRecord;

/// Concurrent map from `namespace:name` to its record. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ExperimentStore {
    records: Arc<RwLock<BTreeMap<String, Arc<ExperimentRecord>>>>,
}

impl ExperimentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an experiment with this key has been discovered.
    pub async fn contains(&self, key: &str) -> bool {
        self.records.read().await.contains_key(key)
    }

    /// Publish a record. The first record for a key wins; returns `false`
    /// if the key was already present.
    pub async fn insert(&self, record: ExperimentRecord) -> bool {
        let key = record.key();
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return false;
        }
        records.insert(key.clone(), Arc::new(record));
        debug!(%key, total = records.len(), "experiment stored");
        true
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ExperimentRecord>> {
        self.records.read().await.get(key).cloned()
    }

    /// All records, ordered by key.
    pub async fn snapshot(&self) -> Vec<Arc<ExperimentRecord>> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
