//! Operator write path.
//!
//! Each edit is written to the store first and then pushed to the device.
//! If the device rejects the edit, the store write is compensated so the
//! inventory does not claim state the device never took.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{Result, StoreOp, SyncError};
use crate::provider::{DeviceProvider, EditMode};
use crate::record::{VlanRecord, keys_of, validate_batch, validate_record, validate_vlan_id};
use crate::store::PersistedStore;

pub struct VlanService<S: ?Sized, P: ?Sized> {
    store: Arc<S>,
    provider: Arc<P>,
}

impl<S, P> VlanService<S, P>
where
    S: PersistedStore + ?Sized,
    P: DeviceProvider + ?Sized,
{
    pub fn new(store: Arc<S>, provider: Arc<P>) -> Self {
        Self { store, provider }
    }

    pub async fn list(&self) -> Result<Vec<VlanRecord>> {
        self.store
            .list()
            .await
            .map_err(|e| SyncError::store(StoreOp::List, Vec::new(), e))
    }

    /// Read one VLAN from the store. The device is not touched; use
    /// [`push_all`](Self::push_all) to re-assert the store on it.
    pub async fn get(&self, vlan_id: u16) -> Result<VlanRecord> {
        validate_vlan_id(i64::from(vlan_id))?;
        self.store
            .get(vlan_id)
            .await
            .map_err(|e| SyncError::store(StoreOp::Get, vec![vlan_id], e))?
            .ok_or(SyncError::NotFound(vlan_id))
    }

    /// Add new VLANs and merge them into the device.
    pub async fn create(&self, records: &[VlanRecord]) -> Result<bool> {
        validate_batch(records)?;
        let keys = keys_of(records);

        self.store
            .create(records)
            .await
            .map_err(|e| SyncError::store(StoreOp::Create, keys.clone(), e))?;

        match self.provider.apply(records, EditMode::Merge).await {
            Ok(changed) => {
                info!(vlan_ids = ?keys, changed, "Created vlans");
                Ok(changed)
            }
            Err(e) => {
                self.compensate(StoreOp::Delete, &keys, self.store.delete(&keys))
                    .await;
                Err(e)
            }
        }
    }

    /// Create or fully replace one VLAN, on the device as well.
    pub async fn put(&self, record: VlanRecord) -> Result<bool> {
        validate_record(&record)?;
        let keys = vec![record.vlan_id];
        let batch = std::slice::from_ref(&record);

        let previous = self
            .store
            .get(record.vlan_id)
            .await
            .map_err(|e| SyncError::store(StoreOp::Get, keys.clone(), e))?;

        match &previous {
            Some(_) => self
                .store
                .update(batch)
                .await
                .map_err(|e| SyncError::store(StoreOp::Update, keys.clone(), e))?,
            None => self
                .store
                .create(batch)
                .await
                .map_err(|e| SyncError::store(StoreOp::Create, keys.clone(), e))?,
        }

        match self.provider.apply(batch, EditMode::Replace).await {
            Ok(changed) => {
                info!(vlan_id = record.vlan_id, changed, "Replaced vlan");
                Ok(changed)
            }
            Err(e) => {
                match previous {
                    Some(prev) => {
                        let restore = [prev];
                        self.compensate(StoreOp::Update, &keys, self.store.update(&restore))
                            .await
                    }
                    None => {
                        self.compensate(StoreOp::Delete, &keys, self.store.delete(&keys))
                            .await
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove one VLAN from store and device.
    pub async fn delete(&self, vlan_id: u16) -> Result<bool> {
        let previous = self.get(vlan_id).await?;
        let keys = vec![vlan_id];

        self.store
            .delete(&keys)
            .await
            .map_err(|e| SyncError::store(StoreOp::Delete, keys.clone(), e))?;

        match self
            .provider
            .apply(std::slice::from_ref(&previous), EditMode::Delete)
            .await
        {
            Ok(changed) => {
                info!(vlan_id, changed, "Deleted vlan");
                Ok(changed)
            }
            Err(e) => {
                let restore = [previous];
                self.compensate(StoreOp::Create, &keys, self.store.create(&restore))
                    .await;
                Err(e)
            }
        }
    }

    /// Make the device hold exactly what the store holds.
    pub async fn push_all(&self) -> Result<bool> {
        let records = self.list().await?;
        let changed = self.provider.apply(&records, EditMode::Override).await?;
        if changed {
            info!(count = records.len(), "Overrode device vlans from store");
        } else {
            info!("Device vlans already match store");
        }
        Ok(changed)
    }

    async fn compensate<F>(&self, op: StoreOp, keys: &[u16], undo: F)
    where
        F: Future<Output = crate::store::Result<()>>,
    {
        warn!(op = %op, vlan_ids = ?keys, "Device edit failed, rolling back store");
        if let Err(e) = undo.await {
            // the next reconciliation cycle repairs the store from the device
            error!(op = %op, vlan_ids = ?keys, "Store rollback failed: {}", e);
        }
    }
}
