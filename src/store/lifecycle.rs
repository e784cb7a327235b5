//! Canned full-record transitions: reset to defaults and forced power-off.

use crate::store::codec;
use crate::store::document::{self, DocumentKind};
use crate::store::record::{
    AlertLevel, AlertState, ControlParams, DeviceId, DeviceRecord, DeviceStatus, FieldName,
    Sanitized, Telemetry,
};

/// Alert level and message text written by a power-off.
pub const POWER_OFF_ALERT: &str = "NONE";

/// Named lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Every field back to its default, `Operational`, `Info`.
    Reset,
    /// Zeroed telemetry and control, `NotOperational`, alert `NONE`.
    PowerOff,
}

impl Lifecycle {
    /// Name used in the activity log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::PowerOff => "power_off",
        }
    }

    /// The record this transition produces for `device_id`.
    #[must_use]
    pub fn record(self, device_id: DeviceId, start_time: &str) -> DeviceRecord {
        match self {
            Self::Reset => DeviceRecord::defaults(device_id, start_time),
            Self::PowerOff => powered_off(device_id, start_time),
        }
    }

    /// Rendered documents, in write order.
    ///
    /// The power-off alert document carries `NONE` for both fields, which a later
    /// load reads back as `Info` with the message `NONE`.
    #[must_use]
    pub fn documents(self, record: &DeviceRecord) -> [(DocumentKind, String); 3] {
        let alert = match self {
            Self::Reset => document::render(record, DocumentKind::Alert, &[]),
            Self::PowerOff => codec::encode_pairs(
                FieldName::ALERT
                    .iter()
                    .map(|f| (f.wire_name(), POWER_OFF_ALERT)),
            ),
        };
        [
            (
                DocumentKind::Status,
                document::render(record, DocumentKind::Status, &[]),
            ),
            (
                DocumentKind::Control,
                document::render(record, DocumentKind::Control, &[]),
            ),
            (DocumentKind::Alert, alert),
        ]
    }
}

fn powered_off(device_id: DeviceId, start_time: &str) -> DeviceRecord {
    let mut record = DeviceRecord::defaults(device_id, start_time);
    record.telemetry = Telemetry::zeroed();
    record.control = ControlParams::zeroed();
    record.reference.status = Sanitized::stored(DeviceStatus::NotOperational);
    record.alert = AlertState {
        level: Sanitized::stored(AlertLevel::Info),
        message: POWER_OFF_ALERT.to_string(),
    };
    record
}
