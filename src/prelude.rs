//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use radio_device_store::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{RdsError, Result};

// Store
pub use crate::store::engine::{DeviceStore, LoadReport, PatchReport};
pub use crate::store::patch::ControlPatch;
pub use crate::store::record::{
    AlertLevel, Anomaly, DeviceId, DeviceRecord, DeviceStatus, FieldMap, FieldName, Sanitized,
};
pub use crate::store::validation::{check_limits, violations};

// Logging
pub use crate::logger::jsonl::ActivityLog;

// Simulator
pub use crate::simulator::TelemetrySimulator;
