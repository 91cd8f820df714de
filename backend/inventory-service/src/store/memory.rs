//! In-memory record store used by tests and local runs
use super::{RecordStore, StoreResult};
use crate::error::StoreError;
use crate::models::{Precondition, ProductPatch, ProductRecord, RecordKey, Version, Versioned};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<RecordKey, Versioned<ProductRecord>>>,
    writes: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record without any checks
    pub fn seed(&self, record: ProductRecord) {
        let mut records = self.records.write();
        let version = records
            .get(&record.key)
            .map(|existing| existing.version.next())
            .unwrap_or(Version::INITIAL);
        records.insert(record.key.clone(), Versioned { value: record, version });
    }

    pub fn snapshot(&self, key: &RecordKey) -> Option<ProductRecord> {
        self.records.read().get(key).map(|v| v.value.clone())
    }

    /// Number of successful writes since construction
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> StoreResult<Versioned<ProductRecord>> {
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn merge_update(
        &self,
        key: &RecordKey,
        patch: &ProductPatch,
        precondition: Precondition,
    ) -> StoreResult<Version> {
        let mut records = self.records.write();
        let stored = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if let Precondition::Version(expected) = precondition {
            if stored.version != expected {
                return Err(StoreError::VersionConflict {
                    key: key.clone(),
                    expected,
                });
            }
        }

        stored.value.apply(patch);
        stored.version = stored.version.next();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.version)
    }

    async fn create(&self, record: ProductRecord) -> StoreResult<Version> {
        let mut records = self.records.write();
        if records.contains_key(&record.key) {
            return Err(StoreError::AlreadyExists(record.key));
        }
        records.insert(
            record.key.clone(),
            Versioned {
                value: record,
                version: Version::INITIAL,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Version::INITIAL)
    }

    fn list_by_partition<'a>(
        &'a self,
        partition_key: &str,
    ) -> BoxStream<'a, StoreResult<ProductRecord>> {
        let matching: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|v| v.value.key.partition_key == partition_key)
            .map(|v| Ok(v.value.clone()))
            .collect();
        stream::iter(matching).boxed()
    }
}
