//! Normalization of raw field maps, telemetry range checks, and alert derivation.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::store::lifecycle::POWER_OFF_ALERT;
use crate::store::record::{
    AlertLevel, AlertState, ControlParams, DEFAULT_ALERT_MESSAGE, DEFAULT_DEVICE_TYPE_HASH,
    DEFAULT_ENABLED, DEFAULT_FREQUENCY, DEFAULT_POWER_SUPPLY_CONSUMPTION,
    DEFAULT_POWER_SUPPLY_VOLTAGE, DEFAULT_SIGNAL_LEVEL, DEFAULT_TEMPERATURE,
    DEFAULT_TRANSMISSION_POWER, DEFAULT_UNIQUE_ID, DEFAULT_VERSION, DEFAULT_VSWR, DeviceId,
    DeviceRecord, DeviceStatus, FieldMap, FieldName, Reference, Sanitized, Telemetry,
};

pub const WITHIN_RANGE_MESSAGE: &str = "Parameters within range.";
pub const BEYOND_RANGE_MESSAGE: &str = "Parameters beyond range.";

/// Closed valid range for one telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub field: FieldName,
    pub min: i64,
    pub max: i64,
}

impl Limit {
    #[must_use]
    pub const fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Valid ranges, in [`FieldName::TELEMETRY`] order.
pub const LIMITS: [Limit; 5] = [
    Limit {
        field: FieldName::Vswr,
        min: 10,
        max: 100,
    },
    Limit {
        field: FieldName::PowerSupplyVoltage,
        min: 100,
        max: 400,
    },
    Limit {
        field: FieldName::PowerSupplyConsumption,
        min: 0,
        max: 100_000,
    },
    Limit {
        field: FieldName::Temperature,
        min: -20,
        max: 200,
    },
    Limit {
        field: FieldName::SignalLevel,
        min: -40,
        max: 15,
    },
];

/// Range limit for `field`, if it is a telemetry field.
#[must_use]
pub fn limit_for(field: FieldName) -> Option<&'static Limit> {
    LIMITS.iter().find(|l| l.field == field)
}

/// A telemetry reading outside its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitViolation {
    pub limit: Limit,
    pub value: i64,
}

// ──────────────────── parsing ────────────────────

fn lookup<'a>(fields: &'a FieldMap, field: FieldName) -> Option<&'a str> {
    fields
        .get(field.wire_name())
        .map(String::as_str)
        .filter(|raw| !raw.is_empty())
}

/// Parse an optional raw value, falling back to `default` when it is absent or invalid.
fn sanitize<T, F>(raw: Option<&str>, default: T, parse: F) -> Sanitized<T>
where
    T: Copy,
    F: FnOnce(&str) -> Option<T>,
{
    match raw {
        None => Sanitized::absent(default),
        Some(raw) => parse(raw).map_or_else(
            || Sanitized::rejected(default, raw),
            Sanitized::stored,
        ),
    }
}

/// Integer field: absent, empty, or unparsable input yields `default`.
#[must_use]
pub fn sanitize_integer(raw: Option<&str>, default: i64) -> Sanitized<i64> {
    sanitize(raw, default, |r| r.parse::<i64>().ok())
}

/// Boolean flag: `true`/`false`, case-insensitive.
#[must_use]
pub fn sanitize_flag(raw: Option<&str>, default: bool) -> Sanitized<bool> {
    sanitize(raw, default, |r| {
        let r = r.trim();
        if r.eq_ignore_ascii_case("true") {
            Some(true)
        } else if r.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    })
}

fn sanitize_enum<T: FromStr + Copy>(raw: Option<&str>, default: T) -> Sanitized<T> {
    sanitize(raw, default, |r| r.parse::<T>().ok())
}

fn text_or(fields: &FieldMap, field: FieldName, default: &str) -> String {
    lookup(fields, field).unwrap_or(default).to_string()
}

// ──────────────────── normalize ────────────────────

/// Build a record from raw fields, applying the defaulting table.
///
/// Absent, empty, and unparsable values all yield the field's default; the
/// rejected raw text is kept on the [`Sanitized`] value. `StartTime` is never
/// taken from `fields`.
#[must_use]
pub fn normalize(
    device_id: DeviceId,
    fields: &FieldMap,
    extra_control: &[String],
    start_time: &str,
) -> DeviceRecord {
    let int = |field, default| sanitize_integer(lookup(fields, field), default);

    let telemetry = Telemetry {
        vswr: int(FieldName::Vswr, DEFAULT_VSWR),
        power_supply_voltage: int(FieldName::PowerSupplyVoltage, DEFAULT_POWER_SUPPLY_VOLTAGE),
        power_supply_consumption: int(
            FieldName::PowerSupplyConsumption,
            DEFAULT_POWER_SUPPLY_CONSUMPTION,
        ),
        temperature: int(FieldName::Temperature, DEFAULT_TEMPERATURE),
        signal_level: int(FieldName::SignalLevel, DEFAULT_SIGNAL_LEVEL),
    };

    let extra: BTreeMap<String, String> = extra_control
        .iter()
        .filter_map(|name| fields.get(name).map(|v| (name.clone(), v.clone())))
        .collect();

    let control = ControlParams {
        frequency: int(FieldName::Frequency, DEFAULT_FREQUENCY),
        transmission_power: int(FieldName::TransmissionPower, DEFAULT_TRANSMISSION_POWER),
        enabled: sanitize_flag(lookup(fields, FieldName::Enabled), DEFAULT_ENABLED),
        extra,
    };

    let reference = Reference {
        device_type: device_id.as_str().to_string(),
        status: sanitize_enum(lookup(fields, FieldName::Status), DeviceStatus::Operational),
        start_time: start_time.to_string(),
        version: text_or(fields, FieldName::Version, DEFAULT_VERSION),
        device_type_hash: text_or(fields, FieldName::DeviceTypeHash, DEFAULT_DEVICE_TYPE_HASH),
        unique_id: text_or(fields, FieldName::UniqueId, DEFAULT_UNIQUE_ID),
    };

    // The power-off marker is a deliberate non-level, not a malformed one.
    let level_raw = lookup(fields, FieldName::Alert).filter(|raw| *raw != POWER_OFF_ALERT);
    let alert = AlertState {
        level: sanitize_enum(level_raw, AlertLevel::Info),
        message: text_or(fields, FieldName::AlertMessage, DEFAULT_ALERT_MESSAGE),
    };

    DeviceRecord {
        device_id,
        telemetry,
        control,
        reference,
        alert,
    }
}

// ──────────────────── limits ────────────────────

/// Every telemetry field outside its range. Empty for a powered-off device.
#[must_use]
pub fn violations(record: &DeviceRecord) -> Vec<LimitViolation> {
    if !record.is_operational() {
        return Vec::new();
    }
    LIMITS
        .iter()
        .zip(record.telemetry.values())
        .filter(|(limit, value)| !limit.contains(*value))
        .map(|(limit, value)| LimitViolation {
            limit: *limit,
            value,
        })
        .collect()
}

/// True when all telemetry is within range, or the device is `NotOperational`.
#[must_use]
pub fn check_limits(record: &DeviceRecord) -> bool {
    violations(record).is_empty()
}

/// Alert transition for the full-record save path.
///
/// Out of range: `Info` escalates to `Warning`, higher levels keep their level, and
/// the message becomes [`BEYOND_RANGE_MESSAGE`]. In range: `Info`/`Warning` settle
/// on `Info` with [`WITHIN_RANGE_MESSAGE`]; `Error` and above are left for an
/// operator to clear.
pub fn derive_alert(alert: &mut AlertState, within_limits: bool) {
    let level = alert.level.get();
    if within_limits {
        if !level.is_externally_managed() {
            alert.level = Sanitized::stored(AlertLevel::Info);
            alert.message = WITHIN_RANGE_MESSAGE.to_string();
        }
    } else {
        if level == AlertLevel::Info {
            alert.level = Sanitized::stored(AlertLevel::Warning);
        }
        alert.message = BEYOND_RANGE_MESSAGE.to_string();
    }
}

/// Alert transition after a control patch: only ever escalates.
///
/// Returns `None` when the alert document should be left alone.
#[must_use]
pub fn escalate_after_patch(alert: &AlertState, within_limits: bool) -> Option<AlertState> {
    if within_limits {
        return None;
    }
    let level = match alert.level.get() {
        AlertLevel::Info => AlertLevel::Warning,
        other => other,
    };
    Some(AlertState {
        level: Sanitized::stored(level),
        message: BEYOND_RANGE_MESSAGE.to_string(),
    })
}
