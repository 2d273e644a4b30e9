//! Daemon configuration.
//!
//! Loaded once at startup from a YAML file. Any error here is fatal and
//! is reported before the first reconciliation cycle.
//!
//! ```yaml
//! provider:
//!   kind: ansible
//!   private_data_dir: /etc/vlansync/ansible
//! database:
//!   url: sqlite:/var/lib/vlansync/vlans.db?mode=rwc
//! synchronizer:
//!   interval_secs: 10
//!   canonical_host: leaf1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::provider::HostSelection;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vlansync/vlansync.yaml";

/// Longest accepted polling interval (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid option {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub synchronizer: SynchronizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ansible(AnsibleConfig),
    File(FileConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnsibleConfig {
    pub private_data_dir: PathBuf,
    #[serde(default = "default_runner")]
    pub runner: String,
    #[serde(default = "default_fetch_playbook")]
    pub fetch_playbook: String,
    #[serde(default = "default_edit_playbook")]
    pub edit_playbook: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub path: PathBuf,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:/var/lib/vlansync/vlans.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynchronizerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Host whose snapshot is authoritative; lowest host name when unset.
    #[serde(default)]
    pub canonical_host: Option<String>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            canonical_host: None,
        }
    }
}

impl SynchronizerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn host_selection(&self) -> HostSelection {
        HostSelection::from_config(self.canonical_host.as_deref())
    }
}

fn default_runner() -> String {
    "ansible-runner".to_string()
}

fn default_fetch_playbook() -> String {
    "get_vlans.yaml".to_string()
}

fn default_edit_playbook() -> String {
    "edit_vlans.yaml".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_interval_secs() -> u64 {
    10
}

impl Config {
    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |option, reason: &str| ConfigError::Invalid {
            option,
            reason: reason.to_string(),
        };

        if self.synchronizer.interval_secs == 0 {
            return Err(invalid("synchronizer.interval_secs", "must be greater than zero"));
        }
        if self.synchronizer.interval_secs > MAX_INTERVAL_SECS {
            return Err(invalid(
                "synchronizer.interval_secs",
                "must not exceed 86400 (one day)",
            ));
        }
        if matches!(&self.synchronizer.canonical_host, Some(host) if host.trim().is_empty()) {
            return Err(invalid("synchronizer.canonical_host", "must not be empty"));
        }
        if self.database.url.trim().is_empty() {
            return Err(invalid("database.url", "is required"));
        }

        match &self.provider {
            ProviderConfig::Ansible(ansible) => {
                if ansible.private_data_dir.as_os_str().is_empty() {
                    return Err(invalid("provider.private_data_dir", "is required"));
                }
                if ansible.timeout_secs == 0 {
                    return Err(invalid("provider.timeout_secs", "must be greater than zero"));
                }
            }
            ProviderConfig::File(file) => {
                if file.path.as_os_str().is_empty() {
                    return Err(invalid("provider.path", "is required"));
                }
                if file.host.trim().is_empty() {
                    return Err(invalid("provider.host", "is required"));
                }
            }
        }

        Ok(())
    }
}
