//! Seed data for the inventory.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, StoreOp, SyncError};
use crate::record::{VlanRecord, keys_of, validate_batch};
use crate::store::PersistedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedAction {
    /// Add records whose key is not stored yet.
    Create,
    /// Remove records whose key is stored.
    Delete,
}

/// Read a JSON array of VLAN records.
pub async fn load_seed_file(path: &Path) -> anyhow::Result<Vec<VlanRecord>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let records: Vec<VlanRecord> = serde_json::from_str(&raw)?;
    validate_batch(&records)?;
    Ok(records)
}

/// Apply seed records. Keys already in the desired state are skipped.
/// Returns how many records were written.
pub async fn seed<S>(store: &S, records: &[VlanRecord], action: SeedAction) -> Result<usize>
where
    S: PersistedStore + ?Sized,
{
    let mut pending = Vec::new();
    for record in records {
        let stored = store
            .get(record.vlan_id)
            .await
            .map_err(|e| SyncError::store(StoreOp::Get, vec![record.vlan_id], e))?;

        match (action, stored) {
            (SeedAction::Create, None) | (SeedAction::Delete, Some(_)) => pending.push(record),
            (_, stored) => debug!(vlan_id = record.vlan_id, present = stored.is_some(), "Seed record skipped"),
        }
    }

    match action {
        SeedAction::Create => {
            let batch: Vec<VlanRecord> = pending.into_iter().cloned().collect();
            store
                .create(&batch)
                .await
                .map_err(|e| SyncError::store(StoreOp::Create, keys_of(&batch), e))?;
            Ok(batch.len())
        }
        SeedAction::Delete => {
            let keys: Vec<u16> = pending.iter().map(|r| r.vlan_id).collect();
            store
                .delete(&keys)
                .await
                .map_err(|e| SyncError::store(StoreOp::Delete, keys.clone(), e))?;
            Ok(keys.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[tokio::test]
    async fn test_seed_create_skips_existing() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create(&[VlanRecord::new(1, "keep", None)]).await.unwrap();

        let records = vec![VlanRecord::new(1, "seeded", None), VlanRecord::new(2, "two", Some(""))];
        assert_eq!(seed(&store, &records, SeedAction::Create).await.unwrap(), 1);

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].name, "keep");
        assert_eq!(listed[1], VlanRecord::new(2, "two", Some("")));

        // running the same seed again writes nothing
        assert_eq!(seed(&store, &records, SeedAction::Create).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_delete_ignores_missing() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create(&[VlanRecord::new(1, "a", None)]).await.unwrap();

        let records = vec![VlanRecord::new(1, "a", None), VlanRecord::new(9, "absent", None)];
        assert_eq!(seed(&store, &records, SeedAction::Delete).await.unwrap(), 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("initial.json");
        std::fs::write(
            &path,
            r#"[{"vlan_id": 1, "name": "default", "description": ""}, {"vlan_id": 2, "name": "eng"}]"#,
        )
        .unwrap();

        let records = load_seed_file(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description.as_deref(), Some(""));

        std::fs::write(&path, r#"[{"vlan_id": 2000, "name": "big"}]"#).unwrap();
        assert!(load_seed_file(&path).await.is_err());
    }
}
