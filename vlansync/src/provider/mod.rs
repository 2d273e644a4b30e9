//! Device providers.
//!
//! A provider reads the live VLAN configuration of the managed device and
//! pushes edits to it. The reconciler only ever calls [`DeviceProvider::fetch`];
//! edits come from the operator write path.

mod ansible;
mod file;

pub use ansible::AnsibleProvider;
pub use file::FileProvider;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::record::VlanRecord;

/// VLAN lists keyed by the host that reported them.
pub type HostSnapshots = BTreeMap<String, Vec<VlanRecord>>;

/// How an edit is applied to the device-side collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Add or update the given records, keep attributes that are not given.
    Merge,
    /// Given records fully replace matching keys; other keys are untouched.
    Replace,
    /// Given records become the entire collection.
    Override,
    /// Remove exactly the given keys.
    Delete,
}

impl EditMode {
    /// Name used by the network automation modules.
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Merge => "merged",
            EditMode::Replace => "replaced",
            EditMode::Override => "overridden",
            EditMode::Delete => "deleted",
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to the live VLAN configuration of a device.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Read the VLANs of every host the provider reaches.
    async fn fetch(&self) -> Result<HostSnapshots>;

    /// Push an edit. Returns whether the device state changed.
    async fn apply(&self, records: &[VlanRecord], mode: EditMode) -> Result<bool>;
}

/// Rule for picking the canonical snapshot out of a multi-host fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostSelection {
    /// Lowest host name in lexical order.
    #[default]
    First,
    /// This host, which must be present in the fetch.
    Named(String),
}

impl HostSelection {
    pub fn from_config(canonical_host: Option<&str>) -> Self {
        match canonical_host {
            Some(host) => HostSelection::Named(host.to_string()),
            None => HostSelection::First,
        }
    }
}

/// Pick the canonical snapshot and check it has unique keys.
pub fn select_snapshot(
    mut hosts: HostSnapshots,
    selection: &HostSelection,
) -> Result<(String, Vec<VlanRecord>)> {
    let (host, records) = match selection {
        HostSelection::First => hosts
            .pop_first()
            .ok_or_else(|| SyncError::ProviderUnavailable("no host reported vlans".into()))?,
        HostSelection::Named(name) => {
            let records = hosts.remove(name).ok_or_else(|| {
                SyncError::ProviderUnavailable(format!(
                    "canonical host '{}' missing from fetch (got {:?})",
                    name,
                    hosts.keys().collect::<Vec<_>>()
                ))
            })?;
            (name.clone(), records)
        }
    };

    let mut seen = HashSet::with_capacity(records.len());
    if let Some(dup) = records.iter().find(|r| !seen.insert(r.vlan_id)) {
        return Err(SyncError::ProviderUnavailable(format!(
            "host '{}' reported vlan {} more than once",
            host, dup.vlan_id
        )));
    }

    Ok((host, records))
}

/// Apply an edit to a keyed collection. Returns whether it changed.
pub fn apply_edit(
    current: &mut BTreeMap<u16, VlanRecord>,
    records: &[VlanRecord],
    mode: EditMode,
) -> bool {
    let before = current.clone();

    match mode {
        EditMode::Merge => {
            for record in records {
                match current.get_mut(&record.vlan_id) {
                    Some(existing) => {
                        existing.name = record.name.clone();
                        if record.description.is_some() {
                            existing.description = record.description.clone();
                        }
                    }
                    None => {
                        current.insert(record.vlan_id, record.clone());
                    }
                }
            }
        }
        EditMode::Replace => {
            for record in records {
                current.insert(record.vlan_id, record.clone());
            }
        }
        EditMode::Override => {
            *current = records.iter().map(|r| (r.vlan_id, r.clone())).collect();
        }
        EditMode::Delete => {
            for record in records {
                current.remove(&record.vlan_id);
            }
        }
    }

    *current != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u16, name: &str, desc: Option<&str>) -> VlanRecord {
        VlanRecord::new(id, name, desc)
    }

    fn collection(records: &[VlanRecord]) -> BTreeMap<u16, VlanRecord> {
        records.iter().map(|r| (r.vlan_id, r.clone())).collect()
    }

    #[test]
    fn test_merge_keeps_unspecified_description() {
        let mut current = collection(&[rec(1, "a", Some("core")), rec(2, "b", None)]);
        let changed = apply_edit(&mut current, &[rec(1, "a2", None)], EditMode::Merge);
        assert!(changed);
        assert_eq!(current[&1], rec(1, "a2", Some("core")));
        assert_eq!(current.len(), 2);
    }

    #[test]
    fn test_replace_overwrites_matching_key_only() {
        let mut current = collection(&[rec(1, "a", Some("core")), rec(2, "b", None)]);
        let changed = apply_edit(&mut current, &[rec(1, "a", None)], EditMode::Replace);
        assert!(changed);
        assert_eq!(current[&1], rec(1, "a", None));
        assert_eq!(current[&2], rec(2, "b", None));
    }

    #[test]
    fn test_override_removes_unmentioned() {
        let mut current = collection(&[rec(1, "a", None), rec(2, "b", None)]);
        let changed = apply_edit(&mut current, &[rec(3, "c", None)], EditMode::Override);
        assert!(changed);
        assert_eq!(current.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_delete_and_idempotent_repeat() {
        let mut current = collection(&[rec(1, "a", None), rec(2, "b", None)]);
        assert!(apply_edit(&mut current, &[rec(2, "b", None)], EditMode::Delete));
        assert!(!apply_edit(&mut current, &[rec(2, "b", None)], EditMode::Delete));
        assert_eq!(current.len(), 1);
    }

    #[test]
    fn test_unchanged_merge_reports_no_change() {
        let mut current = collection(&[rec(1, "a", None)]);
        assert!(!apply_edit(&mut current, &[rec(1, "a", None)], EditMode::Merge));
    }

    #[test]
    fn test_select_first_host_is_lexical() {
        let mut hosts = HostSnapshots::new();
        hosts.insert("switch-b".into(), vec![rec(2, "b", None)]);
        hosts.insert("switch-a".into(), vec![rec(1, "a", None)]);

        let (host, records) = select_snapshot(hosts, &HostSelection::First).unwrap();
        assert_eq!(host, "switch-a");
        assert_eq!(records, vec![rec(1, "a", None)]);
    }

    #[test]
    fn test_select_named_host() {
        let mut hosts = HostSnapshots::new();
        hosts.insert("switch-a".into(), vec![]);
        hosts.insert("switch-b".into(), vec![rec(2, "b", None)]);

        let selection = HostSelection::Named("switch-b".into());
        let (host, records) = select_snapshot(hosts.clone(), &selection).unwrap();
        assert_eq!(host, "switch-b");
        assert_eq!(records.len(), 1);

        let missing = HostSelection::Named("switch-c".into());
        assert!(matches!(
            select_snapshot(hosts, &missing),
            Err(SyncError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_select_rejects_empty_and_duplicate_snapshots() {
        assert!(matches!(
            select_snapshot(HostSnapshots::new(), &HostSelection::First),
            Err(SyncError::ProviderUnavailable(_))
        ));

        let mut hosts = HostSnapshots::new();
        hosts.insert("sw".into(), vec![rec(4, "a", None), rec(4, "b", None)]);
        assert!(matches!(
            select_snapshot(hosts, &HostSelection::First),
            Err(SyncError::ProviderUnavailable(_))
        ));
    }
}
