#![forbid(unsafe_code)]

//! Radio Device Store (rds): parameter store and validation engine for
//! simulated radio-like devices.
//!
//! Each device has three durable `[Key][Value]` documents:
//! 1. **Status**: telemetry readings plus identity and operational status
//! 2. **Control**: writable operational settings, updated by partial patches
//! 3. **Alert**: alert level and message derived from telemetry limits
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use radio_device_store::prelude::*;
//!
//! let store = DeviceStore::open(&Config::default());
//! let radio = DeviceId::parse("radio1")?;
//! let report = store.apply_patch(&radio, &ControlPatch::new().set("Frequency", "9000"))?;
//! assert!(report.within_limits);
//! # Ok::<(), RdsError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod simulator;
pub mod store;
