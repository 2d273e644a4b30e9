//! VLAN record type and input validation.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest VLAN id accepted by the inventory.
pub const VLAN_ID_MIN: u16 = 1;

/// Highest VLAN id accepted by the inventory.
pub const VLAN_ID_MAX: u16 = 1024;

/// A single VLAN as kept in the inventory and reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    pub vlan_id: u16,
    /// Devices may report unnamed VLANs; validation rejects them before storage.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl VlanRecord {
    pub fn new(vlan_id: u16, name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            vlan_id,
            name: name.into(),
            description: description.map(str::to_string),
        }
    }

    /// True when name and description match; the key is not compared.
    pub fn same_fields(&self, other: &VlanRecord) -> bool {
        self.name == other.name && self.description == other.description
    }
}

impl fmt::Display for VlanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "vlan {} '{}' ({})", self.vlan_id, self.name, desc),
            None => write!(f, "vlan {} '{}'", self.vlan_id, self.name),
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid vlan_id {0}, must be within 1..=1024")]
    InvalidVlanId(i64),

    #[error("VLAN name is required (vlan_id {0})")]
    NameRequired(u16),

    #[error("Duplicate vlan_id {0} in request")]
    DuplicateVlanId(u16),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Check a raw id against the accepted range.
pub fn validate_vlan_id(vlan_id: i64) -> Result<u16> {
    if (i64::from(VLAN_ID_MIN)..=i64::from(VLAN_ID_MAX)).contains(&vlan_id) {
        Ok(vlan_id as u16)
    } else {
        Err(ValidationError::InvalidVlanId(vlan_id))
    }
}

/// Validate a single record.
pub fn validate_record(record: &VlanRecord) -> Result<()> {
    validate_vlan_id(i64::from(record.vlan_id))?;
    if record.name.trim().is_empty() {
        return Err(ValidationError::NameRequired(record.vlan_id));
    }
    Ok(())
}

/// Validate every record of a batch and reject repeated keys.
pub fn validate_batch(records: &[VlanRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        validate_record(record)?;
        if !seen.insert(record.vlan_id) {
            return Err(ValidationError::DuplicateVlanId(record.vlan_id));
        }
    }
    Ok(())
}

/// Render the keys of a batch for log lines and error messages.
pub fn keys_of(records: &[VlanRecord]) -> Vec<u16> {
    records.iter().map(|r| r.vlan_id).collect()
}
