//! PostgreSQL record store
//!
//! Records live in `product_records` with their attributes in a JSONB
//! column; merge-updates use the `||` operator so only patched keys change.
use super::{RecordStore, StoreResult};
use crate::error::StoreError;
use crate::models::{Precondition, ProductPatch, ProductRecord, RecordKey, Version, Versioned};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "Record store connection pool initialized");
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, key: &RecordKey) -> StoreResult<Option<Version>> {
        let row = sqlx::query(
            r#"
            SELECT version FROM product_records
            WHERE partition_key = $1 AND row_key = $2
            "#,
        )
        .bind(&key.partition_key)
        .bind(&key.row_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.try_get::<i64, _>("version").map(to_version))
            .transpose()
            .map_err(StoreError::from)
    }
}

fn to_version(raw: i64) -> Version {
    Version(raw.max(0) as u64)
}

fn record_from_row(row: &PgRow) -> StoreResult<ProductRecord> {
    let Json(properties): Json<Map<String, Value>> = row.try_get("properties")?;
    Ok(ProductRecord {
        key: RecordKey::new(
            row.try_get::<String, _>("partition_key")?,
            row.try_get::<String, _>("row_key")?,
        ),
        properties,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, key: &RecordKey) -> StoreResult<Versioned<ProductRecord>> {
        let row = sqlx::query(
            r#"
            SELECT partition_key, row_key, properties, version
            FROM product_records
            WHERE partition_key = $1 AND row_key = $2
            "#,
        )
        .bind(&key.partition_key)
        .bind(&key.row_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        Ok(Versioned {
            value: record_from_row(&row)?,
            version: to_version(row.try_get("version")?),
        })
    }

    async fn merge_update(
        &self,
        key: &RecordKey,
        patch: &ProductPatch,
        precondition: Precondition,
    ) -> StoreResult<Version> {
        let expected = match precondition {
            Precondition::Any => None,
            Precondition::Version(v) => Some(v.0 as i64),
        };

        let row = sqlx::query(
            r#"
            UPDATE product_records
            SET properties = properties || $3,
                version = version + 1,
                updated_at = NOW()
            WHERE partition_key = $1
              AND row_key = $2
              AND ($4::BIGINT IS NULL OR version = $4)
            RETURNING version
            "#,
        )
        .bind(&key.partition_key)
        .bind(&key.row_key)
        .bind(Json(patch.fields()))
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let version = to_version(row.try_get("version")?);
            debug!(key = %key, %version, "Record merge-updated");
            return Ok(version);
        }

        // Nothing matched: either the record is gone or the version moved on
        match (self.current_version(key).await?, precondition) {
            (None, _) => Err(StoreError::NotFound(key.clone())),
            (Some(_), Precondition::Version(expected)) => Err(StoreError::VersionConflict {
                key: key.clone(),
                expected,
            }),
            (Some(_), Precondition::Any) => Err(StoreError::NotFound(key.clone())),
        }
    }

    async fn create(&self, record: ProductRecord) -> StoreResult<Version> {
        let row = sqlx::query(
            r#"
            INSERT INTO product_records (partition_key, row_key, properties, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (partition_key, row_key) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(&record.key.partition_key)
        .bind(&record.key.row_key)
        .bind(Json(&record.properties))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(to_version(row.try_get("version")?)),
            None => Err(StoreError::AlreadyExists(record.key)),
        }
    }

    fn list_by_partition<'a>(
        &'a self,
        partition_key: &str,
    ) -> BoxStream<'a, StoreResult<ProductRecord>> {
        sqlx::query(
            r#"
            SELECT partition_key, row_key, properties
            FROM product_records
            WHERE partition_key = $1
            ORDER BY row_key
            "#,
        )
        .bind(partition_key.to_owned())
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::from).and_then(|row| record_from_row(&row)))
        .boxed()
    }
}
