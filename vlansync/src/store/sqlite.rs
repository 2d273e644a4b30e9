use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};

use super::{PersistedStore, Result, StoreError};
use crate::record::{VlanRecord, validate_batch, validate_vlan_id};

/// SQLite-backed VLAN inventory
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `url`,
    /// e.g. `sqlite:/var/lib/vlansync/vlans.db?mode=rwc`.
    pub async fn open(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %url, "Opened VLAN store");
        Ok(store)
    }

    /// Private in-memory database. Holds a single connection for the
    /// lifetime of the pool, since the data lives in that connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vlans (
                vlan_id INTEGER PRIMARY KEY CHECK (vlan_id BETWEEN 1 AND 1024),
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PersistedStore for SqliteStore {
    async fn list(&self) -> Result<Vec<VlanRecord>> {
        let rows = sqlx::query("SELECT vlan_id, name, description FROM vlans ORDER BY vlan_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn get(&self, vlan_id: u16) -> Result<Option<VlanRecord>> {
        let row = sqlx::query("SELECT vlan_id, name, description FROM vlans WHERE vlan_id = ?")
            .bind(i64::from(vlan_id))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn create(&self, records: &[VlanRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_batch(records)?;

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let exists = sqlx::query("SELECT 1 FROM vlans WHERE vlan_id = ?")
                .bind(i64::from(record.vlan_id))
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_some() {
                return Err(StoreError::AlreadyExists(record.vlan_id));
            }

            sqlx::query(
                r#"
                INSERT INTO vlans (vlan_id, name, description, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(record.vlan_id))
            .bind(&record.name)
            .bind(&record.description)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = records.len(), "Created vlan records");
        Ok(())
    }

    async fn update(&self, records: &[VlanRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_batch(records)?;

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let result = sqlx::query(
                "UPDATE vlans SET name = ?, description = ?, updated_at = ? WHERE vlan_id = ?",
            )
            .bind(&record.name)
            .bind(&record.description)
            .bind(&now)
            .bind(i64::from(record.vlan_id))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(record.vlan_id));
            }
        }

        tx.commit().await?;
        debug!(count = records.len(), "Updated vlan records");
        Ok(())
    }

    async fn delete(&self, vlan_ids: &[u16]) -> Result<()> {
        if vlan_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for vlan_id in vlan_ids {
            let result = sqlx::query("DELETE FROM vlans WHERE vlan_id = ?")
                .bind(i64::from(*vlan_id))
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(*vlan_id));
            }
        }

        tx.commit().await?;
        debug!(count = vlan_ids.len(), "Deleted vlan records");
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<VlanRecord> {
    let raw_id: i64 = row.try_get("vlan_id")?;
    let vlan_id = validate_vlan_id(raw_id).map_err(|_| StoreError::CorruptRow(raw_id))?;

    Ok(VlanRecord {
        vlan_id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}
