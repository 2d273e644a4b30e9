//! vlansync: VLAN inventory synchronizer
//!
//! Keeps a persisted VLAN inventory in line with the live configuration of
//! a managed device. The device is authoritative: a background scheduler
//! periodically reconciles the store against it, while the operator write
//! path edits both.

pub mod config;
pub mod error;
pub mod provider;
pub mod reconciler;
pub mod record;
pub mod scheduler;
pub mod seed;
pub mod service;
pub mod store;

pub use error::{Result, SyncError};
pub use record::VlanRecord;
