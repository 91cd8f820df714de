//! Record store client
//!
//! Typed access to product records addressed by `(partitionKey, rowKey)`.
//! Every write bumps the record's [`Version`]; conditional merge-updates
//! compare it so concurrent read-modify-write sequences cannot lose updates.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::error::StoreError;
use crate::models::{Precondition, ProductPatch, ProductRecord, RecordKey, Version, Versioned};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record and the version it was read at
    async fn get(&self, key: &RecordKey) -> StoreResult<Versioned<ProductRecord>>;

    /// Overwrite only the fields in `patch`.
    ///
    /// Fails with `NotFound` if the record does not exist and with
    /// `VersionConflict` if `precondition` names a version that is no longer
    /// current. Returns the new version.
    async fn merge_update(
        &self,
        key: &RecordKey,
        patch: &ProductPatch,
        precondition: Precondition,
    ) -> StoreResult<Version>;

    /// Insert a new record; fails with `AlreadyExists` on a duplicate key
    async fn create(&self, record: ProductRecord) -> StoreResult<Version>;

    /// Lazily stream every record in a partition, ordered by row key
    fn list_by_partition<'a>(
        &'a self,
        partition_key: &str,
    ) -> BoxStream<'a, StoreResult<ProductRecord>>;
}
