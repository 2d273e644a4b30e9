//! Ansible provider
//!
//! Drives `ansible-runner` as a child process. Inputs go through
//! `env/extravars` in the private data directory; results are read back
//! from the run's artifact directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeviceProvider, EditMode, HostSnapshots};
use crate::error::SyncError;
use crate::record::VlanRecord;

/// Provider that gathers and edits VLANs through ansible playbooks.
pub struct AnsibleProvider {
    runner: String,
    private_data_dir: PathBuf,
    fetch_playbook: String,
    edit_playbook: String,
    timeout: Duration,
    /// One run at a time: every run rewrites `env/extravars`.
    run_lock: Mutex<()>,
}

impl AnsibleProvider {
    pub fn new(
        runner: String,
        private_data_dir: PathBuf,
        fetch_playbook: String,
        edit_playbook: String,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            private_data_dir,
            fetch_playbook,
            edit_playbook,
            timeout,
            run_lock: Mutex::new(()),
        }
    }

    /// Run a playbook and return its artifact directory.
    async fn run_playbook(&self, playbook: &str, extravars: Value) -> Result<PathBuf> {
        let _guard = self.run_lock.lock().await;

        let env_dir = self.private_data_dir.join("env");
        tokio::fs::create_dir_all(&env_dir)
            .await
            .with_context(|| format!("Failed to create {}", env_dir.display()))?;
        tokio::fs::write(env_dir.join("extravars"), serde_json::to_vec(&extravars)?)
            .await
            .context("Failed to write extravars")?;

        let ident = Uuid::new_v4().to_string();
        info!(playbook = %playbook, ident = %ident, "Running ansible playbook");

        let child = Command::new(&self.runner)
            .arg("run")
            .arg(&self.private_data_dir)
            .args(["-p", playbook, "--ident", &ident])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", playbook, self.timeout))?
            .with_context(|| format!("Failed to run {}", self.runner))?;

        let artifact_dir = self.private_data_dir.join("artifacts").join(&ident);
        let rc = read_rc(&artifact_dir)
            .await
            .or_else(|_| output.status.code().ok_or_else(|| anyhow!("killed by signal")))?;
        let status = tokio::fs::read_to_string(artifact_dir.join("status"))
            .await
            .unwrap_or_else(|_| "unknown".to_string());

        debug!(playbook = %playbook, rc = rc, status = %status.trim(), "Playbook finished");

        if rc != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed with rc {} and status {}: {}",
                playbook,
                rc,
                status.trim(),
                stderr.trim()
            );
        }

        Ok(artifact_dir)
    }
}

#[async_trait]
impl DeviceProvider for AnsibleProvider {
    async fn fetch(&self) -> crate::error::Result<HostSnapshots> {
        let extravars = json!({ "resources": ["vlans"] });

        let artifact_dir = self
            .run_playbook(&self.fetch_playbook, extravars)
            .await
            .map_err(|e| SyncError::ProviderUnavailable(format!("{:#}", e)))?;

        let hosts = read_vlan_facts(&artifact_dir)
            .await
            .map_err(|e| SyncError::ProviderUnavailable(format!("{:#}", e)))?;
        debug!(hosts = hosts.len(), "Fetched vlan facts");
        Ok(hosts)
    }

    async fn apply(&self, records: &[VlanRecord], mode: EditMode) -> crate::error::Result<bool> {
        let extravars = json!({
            "vlans_config": records,
            "vlans_action": mode.as_str(),
        });

        let failed = |e: anyhow::Error| SyncError::ProviderApplyFailed {
            mode,
            message: format!("{:#}", e),
        };

        let artifact_dir = self
            .run_playbook(&self.edit_playbook, extravars)
            .await
            .map_err(failed)?;
        let changed = read_changed(&artifact_dir).await.map_err(failed)?;

        if changed {
            info!(mode = %mode, count = records.len(), "Device vlan config changed");
        } else {
            debug!(mode = %mode, "No change required for device vlan config");
        }
        Ok(changed)
    }
}

async fn read_rc(artifact_dir: &Path) -> Result<i32> {
    let raw = tokio::fs::read_to_string(artifact_dir.join("rc")).await?;
    Ok(raw.trim().parse()?)
}

/// Collect `ansible_network_resources.vlans` from every host in the fact cache.
pub(crate) async fn read_vlan_facts(artifact_dir: &Path) -> Result<HostSnapshots> {
    let cache_dir = artifact_dir.join("fact_cache");
    let mut entries = tokio::fs::read_dir(&cache_dir)
        .await
        .with_context(|| format!("No fact cache at {}", cache_dir.display()))?;

    let mut hosts = BTreeMap::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let host = entry.file_name().to_string_lossy().into_owned();
        let raw = tokio::fs::read_to_string(entry.path()).await?;
        let facts: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid fact cache for host {}", host))?;

        let vlans = match facts.pointer("/ansible_network_resources/vlans") {
            Some(Value::Null) | None => {
                warn!(host = %host, "Host reported no vlan facts");
                Vec::new()
            }
            Some(v) => serde_json::from_value::<Vec<VlanRecord>>(v.clone())
                .with_context(|| format!("Invalid vlan facts for host {}", host))?,
        };
        hosts.insert(host, vlans);
    }

    Ok(hosts)
}

/// True when the run's final stats count a change on any host.
pub(crate) async fn read_changed(artifact_dir: &Path) -> Result<bool> {
    let events_dir = artifact_dir.join("job_events");
    let mut entries = tokio::fs::read_dir(&events_dir)
        .await
        .with_context(|| format!("No job events at {}", events_dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let event: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid job event {}", path.display()))?;
        if event.get("event").and_then(Value::as_str) != Some("playbook_on_stats") {
            continue;
        }

        let changed = event
            .pointer("/event_data/changed")
            .and_then(Value::as_object)
            .map(|hosts| hosts.values().any(|n| n.as_u64().unwrap_or(0) > 0))
            .unwrap_or(false);
        return Ok(changed);
    }

    bail!("run produced no playbook_on_stats event")
}
