//! Reconciliation of the stored inventory against the device.
//!
//! A cycle lists the store, fetches the device, picks the canonical
//! snapshot, computes a [`ReconciliationPlan`] and applies it to the store.
//! The device is only read here.

pub mod diff;

pub use diff::{ReconciliationPlan, diff};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreOp, SyncError};
use crate::provider::{DeviceProvider, HostSelection, select_snapshot};
use crate::record::{VlanRecord, keys_of, validate_record};
use crate::store::PersistedStore;

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Host whose snapshot was used.
    pub host: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Device records left out because the store cannot hold them.
    pub skipped: usize,
}

impl CycleReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// One reconciliation cycle, as driven by the scheduler.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self) -> Result<CycleReport>;
}

/// Reconciles a store against a device provider.
pub struct Reconciler<S: ?Sized, P: ?Sized> {
    store: Arc<S>,
    provider: Arc<P>,
    selection: HostSelection,
}

impl<S, P> Reconciler<S, P>
where
    S: PersistedStore + ?Sized,
    P: DeviceProvider + ?Sized,
{
    pub fn new(store: Arc<S>, provider: Arc<P>, selection: HostSelection) -> Self {
        Self {
            store,
            provider,
            selection,
        }
    }
}

#[async_trait]
impl<S, P> Reconcile for Reconciler<S, P>
where
    S: PersistedStore + ?Sized,
    P: DeviceProvider + ?Sized,
{
    async fn reconcile(&self) -> Result<CycleReport> {
        let stored = self
            .store
            .list()
            .await
            .map_err(|e| SyncError::store(StoreOp::List, Vec::new(), e))?;

        let hosts = self.provider.fetch().await?;
        let (host, observed) = select_snapshot(hosts, &self.selection)?;
        debug!(host = %host, stored = stored.len(), observed = observed.len(), "Fetched vlan state");

        let (observed, skipped) = storable(observed);
        for record in &skipped {
            warn!(host = %host, vlan_id = record.vlan_id, "Skipping device vlan the store cannot hold");
        }

        let plan = diff(&stored, &observed);
        if plan.is_empty() {
            debug!(host = %host, "Store already matches device");
        } else {
            info!(
                host = %host,
                create = ?keys_of(&plan.to_create),
                update = ?keys_of(&plan.to_update),
                delete = ?plan.to_delete,
                "Reconciling store with device"
            );
        }

        apply_plan(&plan, self.store.as_ref()).await?;

        Ok(CycleReport {
            host,
            created: plan.to_create.len(),
            updated: plan.to_update.len(),
            deleted: plan.to_delete.len(),
            skipped: skipped.len(),
        })
    }
}

/// Split device records into those the store accepts and those it rejects.
fn storable(observed: Vec<VlanRecord>) -> (Vec<VlanRecord>, Vec<VlanRecord>) {
    observed
        .into_iter()
        .partition(|record| validate_record(record).is_ok())
}

/// Apply a plan as create, update, delete batches.
///
/// Stops at the first failed batch. Batches applied before it stay applied;
/// the next cycle recomputes whatever is left.
pub async fn apply_plan<S>(plan: &ReconciliationPlan, store: &S) -> Result<()>
where
    S: PersistedStore + ?Sized,
{
    if !plan.to_create.is_empty() {
        store
            .create(&plan.to_create)
            .await
            .map_err(|e| SyncError::store(StoreOp::Create, keys_of(&plan.to_create), e))?;
    }

    if !plan.to_update.is_empty() {
        store
            .update(&plan.to_update)
            .await
            .map_err(|e| SyncError::store(StoreOp::Update, keys_of(&plan.to_update), e))?;
    }

    if !plan.to_delete.is_empty() {
        let keys: Vec<u16> = plan.to_delete.iter().copied().collect();
        store
            .delete(&keys)
            .await
            .map_err(|e| SyncError::store(StoreOp::Delete, keys.clone(), e))?;
    }

    Ok(())
}
