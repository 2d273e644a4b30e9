//! Error types shared by the reconciler, scheduler and write path.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::EditMode;
use crate::record::ValidationError;
use crate::store::StoreError;

/// Store call that failed, as reported in [`SyncError::StoreOperationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOp::List => "list",
            StoreOp::Get => "get",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        })
    }
}

/// Errors that can occur while synchronizing the inventory with a device.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Device unreachable or the fetch run reported a non-zero status.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Device rejected an edit.
    #[error("provider apply failed (mode {mode}): {message}")]
    ProviderApplyFailed { mode: EditMode, message: String },

    /// One store batch failed and was rolled back.
    #[error("store {op} failed for vlan ids {keys:?}: {source}")]
    StoreOperationFailed {
        op: StoreOp,
        keys: Vec<u16>,
        #[source]
        source: StoreError,
    },

    /// Missing or invalid configuration. Only raised at startup.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Operator input rejected before touching store or device.
    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationError),

    /// Operator asked for a vlan that is not in the inventory.
    #[error("vlan {0} not found")]
    NotFound(u16),
}

impl SyncError {
    pub(crate) fn store(op: StoreOp, keys: Vec<u16>, source: StoreError) -> Self {
        SyncError::StoreOperationFailed { op, keys, source }
    }

    /// Short tag for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::ProviderUnavailable(_) => "provider_unavailable",
            SyncError::ProviderApplyFailed { .. } => "provider_apply_failed",
            SyncError::StoreOperationFailed { .. } => "store_operation_failed",
            SyncError::Configuration(_) => "configuration",
            SyncError::Invalid(_) => "invalid",
            SyncError::NotFound(_) => "not_found",
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_names_keys() {
        let err = SyncError::store(StoreOp::Delete, vec![7, 9], StoreError::NotFound(9));
        let msg = err.to_string();
        assert!(msg.contains("store delete failed"));
        assert!(msg.contains("[7, 9]"));
        assert_eq!(err.kind(), "store_operation_failed");
    }

    #[test]
    fn test_apply_failure_names_mode() {
        let err = SyncError::ProviderApplyFailed {
            mode: EditMode::Override,
            message: "rc=2".to_string(),
        };
        assert_eq!(err.to_string(), "provider apply failed (mode overridden): rc=2");
    }
}
