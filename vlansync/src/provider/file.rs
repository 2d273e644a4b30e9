//! File-backed device emulator.
//!
//! The device is a JSON document `{"<host>": [VlanRecord, ...]}`. Edits
//! touch the configured host only and rewrite the file when something
//! changed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DeviceProvider, EditMode, HostSnapshots, apply_edit};
use crate::error::{Result, SyncError};
use crate::record::VlanRecord;

pub struct FileProvider {
    path: PathBuf,
    host: String,
    write_lock: Mutex<()>,
}

impl FileProvider {
    pub fn new(path: PathBuf, host: String) -> Self {
        Self {
            path,
            host,
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<HostSnapshots> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SyncError::ProviderUnavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            SyncError::ProviderUnavailable(format!("invalid device file {}: {}", self.path.display(), e))
        })
    }

    async fn write(&self, hosts: &HostSnapshots, mode: EditMode) -> Result<()> {
        let failed = |message: String| SyncError::ProviderApplyFailed { mode, message };

        let body = serde_json::to_vec_pretty(hosts).map_err(|e| failed(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| failed(format!("cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| failed(format!("cannot replace {}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl DeviceProvider for FileProvider {
    async fn fetch(&self) -> Result<HostSnapshots> {
        self.read().await
    }

    async fn apply(&self, records: &[VlanRecord], mode: EditMode) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut hosts = self.read().await.map_err(|e| SyncError::ProviderApplyFailed {
            mode,
            message: e.to_string(),
        })?;

        let mut current: BTreeMap<u16, VlanRecord> = hosts
            .remove(&self.host)
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.vlan_id, r))
            .collect();

        let changed = apply_edit(&mut current, records, mode);
        hosts.insert(self.host.clone(), current.into_values().collect());

        if changed {
            self.write(&hosts, mode).await?;
            info!(host = %self.host, mode = %mode, "Device file updated");
        } else {
            debug!(host = %self.host, mode = %mode, "Device file already up to date");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_rewrites_configured_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(
            &path,
            r#"{"leaf1": [{"vlan_id": 1, "name": "default"}], "leaf2": [{"vlan_id": 7, "name": "x"}]}"#,
        )
        .unwrap();

        let provider = FileProvider::new(path.clone(), "leaf1".to_string());
        let changed = provider
            .apply(&[VlanRecord::new(5, "eng", None)], EditMode::Override)
            .await
            .unwrap();
        assert!(changed);

        let hosts = provider.fetch().await.unwrap();
        assert_eq!(hosts["leaf1"], vec![VlanRecord::new(5, "eng", None)]);
        assert_eq!(hosts["leaf2"], vec![VlanRecord::new(7, "x", None)]);

        // same edit again is a no-op
        let changed = provider
            .apply(&[VlanRecord::new(5, "eng", None)], EditMode::Override)
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path().join("absent.json"), "leaf1".to_string());
        assert!(matches!(
            provider.fetch().await,
            Err(SyncError::ProviderUnavailable(_))
        ));
        assert!(matches!(
            provider.apply(&[], EditMode::Delete).await,
            Err(SyncError::ProviderApplyFailed { .. })
        ));
    }
}
