//! Device record: typed telemetry, control, reference and alert state for one device.
//!
//! Wire format stays stringly (`[Key][Value]` documents, see [`crate::store::codec`]),
//! but inside the crate every numeric field is a [`Sanitized`] value that remembers
//! whether it came from storage, was absent, or was rejected and replaced by its
//! default.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::errors::{RdsError, Result};
use crate::store::document::DocumentKind;
use crate::store::validation;

/// Flat wire mapping of field name to raw string value.
pub type FieldMap = BTreeMap<String, String>;

// ──────────────────── defaults ────────────────────

pub const DEFAULT_VSWR: i64 = 50;
pub const DEFAULT_POWER_SUPPLY_VOLTAGE: i64 = 200;
pub const DEFAULT_POWER_SUPPLY_CONSUMPTION: i64 = 50_000;
pub const DEFAULT_TEMPERATURE: i64 = 100;
pub const DEFAULT_SIGNAL_LEVEL: i64 = 5;
pub const DEFAULT_FREQUENCY: i64 = 12_000;
pub const DEFAULT_TRANSMISSION_POWER: i64 = 10_000;
pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_DEVICE_TYPE_HASH: &str = "#ISODERADIO";
pub const DEFAULT_UNIQUE_ID: &str = "SAMPLE_RADIO_1";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_ALERT_MESSAGE: &str = "Parameters within limit.";

/// Format used for `StartTime`.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ──────────────────── field names ────────────────────

/// Every field the store knows about, in canonical document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    Vswr,
    PowerSupplyVoltage,
    PowerSupplyConsumption,
    Temperature,
    SignalLevel,
    Frequency,
    TransmissionPower,
    Enabled,
    DeviceType,
    Status,
    StartTime,
    Version,
    DeviceTypeHash,
    UniqueId,
    Alert,
    AlertMessage,
}

impl FieldName {
    pub const ALL: [Self; 16] = [
        Self::Vswr,
        Self::PowerSupplyVoltage,
        Self::PowerSupplyConsumption,
        Self::Temperature,
        Self::SignalLevel,
        Self::Frequency,
        Self::TransmissionPower,
        Self::Enabled,
        Self::DeviceType,
        Self::Status,
        Self::StartTime,
        Self::Version,
        Self::DeviceTypeHash,
        Self::UniqueId,
        Self::Alert,
        Self::AlertMessage,
    ];

    pub const TELEMETRY: [Self; 5] = [
        Self::Vswr,
        Self::PowerSupplyVoltage,
        Self::PowerSupplyConsumption,
        Self::Temperature,
        Self::SignalLevel,
    ];

    pub const CONTROL: [Self; 3] = [Self::Frequency, Self::TransmissionPower, Self::Enabled];

    pub const REFERENCE: [Self; 6] = [
        Self::DeviceType,
        Self::Status,
        Self::StartTime,
        Self::Version,
        Self::DeviceTypeHash,
        Self::UniqueId,
    ];

    pub const ALERT: [Self; 2] = [Self::Alert, Self::AlertMessage];

    /// Name used in documents and in the JSON views.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Vswr => "VSWR",
            Self::PowerSupplyVoltage => "PowerSupplyVoltage",
            Self::PowerSupplyConsumption => "PowerSupplyConsumption",
            Self::Temperature => "Temperature",
            Self::SignalLevel => "SignalLevel",
            Self::Frequency => "Frequency",
            Self::TransmissionPower => "TransmissionPower",
            Self::Enabled => "Enabled",
            Self::DeviceType => "DeviceType",
            Self::Status => "Status",
            Self::StartTime => "StartTime",
            Self::Version => "Version",
            Self::DeviceTypeHash => "DeviceTypeHash",
            Self::UniqueId => "UniqueID",
            Self::Alert => "Alert",
            Self::AlertMessage => "AlertMessage",
        }
    }

    #[must_use]
    pub const fn snake_name(self) -> &'static str {
        match self {
            Self::Vswr => "vswr",
            Self::PowerSupplyVoltage => "power_supply_voltage",
            Self::PowerSupplyConsumption => "power_supply_consumption",
            Self::Temperature => "temperature",
            Self::SignalLevel => "signal_level",
            Self::Frequency => "frequency",
            Self::TransmissionPower => "transmission_power",
            Self::Enabled => "enabled",
            Self::DeviceType => "device_type",
            Self::Status => "status",
            Self::StartTime => "start_time",
            Self::Version => "version",
            Self::DeviceTypeHash => "device_type_hash",
            Self::UniqueId => "unique_id",
            Self::Alert => "alert_level",
            Self::AlertMessage => "alert_message",
        }
    }

    /// Exact wire-name lookup, as used when decoding documents.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_name() == name)
    }

    /// Lookup accepting either the wire name or the snake_case name.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.wire_name() == key || f.snake_name() == key)
    }

    #[must_use]
    pub fn is_telemetry(self) -> bool {
        Self::TELEMETRY.contains(&self)
    }

    #[must_use]
    pub fn is_control(self) -> bool {
        Self::CONTROL.contains(&self)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ──────────────────── enums ────────────────────

/// Severity summarizing whether telemetry is within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
    Severe,
    Critical,
}

impl AlertLevel {
    pub const ALL: [Self; 5] = [
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Severe,
        Self::Critical,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Severe => "Severe",
            Self::Critical => "Critical",
        }
    }

    /// Levels the engine never sets or clears on its own.
    #[must_use]
    pub const fn is_externally_managed(self) -> bool {
        matches!(self, Self::Error | Self::Severe | Self::Critical)
    }
}

impl FromStr for AlertLevel {
    type Err = ();

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|l| l.as_str() == raw).ok_or(())
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational state of the device. `NotOperational` suspends range checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceStatus {
    #[default]
    Operational,
    NotOperational,
}

impl DeviceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::NotOperational => "NotOperational",
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = ();

    /// Accepts the canonical spellings plus the legacy `Not Operational` and
    /// `OFFLINE` forms found in older documents.
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim() {
            "Operational" => Ok(Self::Operational),
            "NotOperational" | "Not Operational" => Ok(Self::NotOperational),
            other if other.eq_ignore_ascii_case("offline") => Ok(Self::NotOperational),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────── sanitized values ────────────────────

/// Where a sanitized value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Parsed from storage or caller input.
    Stored,
    /// No value (or an empty one) was supplied; the default was used.
    Absent,
    /// The raw value failed to parse; the default was used.
    Rejected(String),
}

/// A validated field value plus the record of how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized<T> {
    value: T,
    provenance: Provenance,
}

impl<T: Copy> Sanitized<T> {
    #[must_use]
    pub const fn stored(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Stored,
        }
    }

    #[must_use]
    pub const fn absent(default: T) -> Self {
        Self {
            value: default,
            provenance: Provenance::Absent,
        }
    }

    #[must_use]
    pub fn rejected(default: T, raw: impl Into<String>) -> Self {
        Self {
            value: default,
            provenance: Provenance::Rejected(raw.into()),
        }
    }

    #[must_use]
    pub const fn get(&self) -> T {
        self.value
    }

    #[must_use]
    pub const fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// True when the raw input was invalid and the default was substituted.
    #[must_use]
    pub fn was_rejected(&self) -> bool {
        matches!(self.provenance, Provenance::Rejected(_))
    }

    /// The raw text that was rejected, if any.
    #[must_use]
    pub fn rejected_raw(&self) -> Option<&str> {
        match &self.provenance {
            Provenance::Rejected(raw) => Some(raw),
            _ => None,
        }
    }
}

// ──────────────────── device id ────────────────────

const MAX_DEVICE_ID_LEN: usize = 64;

/// Opaque device identifier, also the stem of the device's document names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Accepts `[A-Za-z0-9_-]{1,64}`; anything else could escape the data directory.
    pub fn parse(raw: &str) -> Result<Self> {
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if raw.len() > MAX_DEVICE_ID_LEN {
            Some("must be at most 64 characters")
        } else if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            Some("may only contain ASCII letters, digits, '_' and '-'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RdsError::InvalidDeviceId {
                id: raw.to_string(),
                reason,
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = RdsError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────── anomalies ────────────────────

/// Non-fatal condition absorbed by the store instead of being returned as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A numeric or enumerated field failed to parse and was defaulted.
    MalformedField { field: FieldName, raw: String },
    /// A patch named a field that is not a known control field.
    UnknownPatchKey { key: String },
    /// A document did not exist and was treated as empty.
    MissingDocument { kind: DocumentKind },
    /// A document existed but could not be read and was treated as empty.
    UnreadableDocument { kind: DocumentKind, details: String },
}

// ──────────────────── record parts ────────────────────

/// Device-reported measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    pub vswr: Sanitized<i64>,
    pub power_supply_voltage: Sanitized<i64>,
    pub power_supply_consumption: Sanitized<i64>,
    pub temperature: Sanitized<i64>,
    pub signal_level: Sanitized<i64>,
}

impl Telemetry {
    /// Nominal readings from the defaulting table.
    #[must_use]
    pub fn nominal() -> Self {
        Self::from_values([
            DEFAULT_VSWR,
            DEFAULT_POWER_SUPPLY_VOLTAGE,
            DEFAULT_POWER_SUPPLY_CONSUMPTION,
            DEFAULT_TEMPERATURE,
            DEFAULT_SIGNAL_LEVEL,
        ])
    }

    /// All-zero snapshot written by a power-off.
    #[must_use]
    pub fn zeroed() -> Self {
        Self::from_values([0; 5])
    }

    /// Build from values in [`FieldName::TELEMETRY`] order.
    #[must_use]
    pub fn from_values(values: [i64; 5]) -> Self {
        let [vswr, voltage, consumption, temperature, signal] = values;
        Self {
            vswr: Sanitized::stored(vswr),
            power_supply_voltage: Sanitized::stored(voltage),
            power_supply_consumption: Sanitized::stored(consumption),
            temperature: Sanitized::stored(temperature),
            signal_level: Sanitized::stored(signal),
        }
    }

    /// Values in [`FieldName::TELEMETRY`] order.
    #[must_use]
    pub fn values(&self) -> [i64; 5] {
        [
            self.vswr.get(),
            self.power_supply_voltage.get(),
            self.power_supply_consumption.get(),
            self.temperature.get(),
            self.signal_level.get(),
        ]
    }

    /// `(field, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &Sanitized<i64>)> {
        [
            (FieldName::Vswr, &self.vswr),
            (FieldName::PowerSupplyVoltage, &self.power_supply_voltage),
            (FieldName::PowerSupplyConsumption, &self.power_supply_consumption),
            (FieldName::Temperature, &self.temperature),
            (FieldName::SignalLevel, &self.signal_level),
        ]
        .into_iter()
    }
}

/// Writable operational settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlParams {
    pub frequency: Sanitized<i64>,
    pub transmission_power: Sanitized<i64>,
    pub enabled: Sanitized<bool>,
    /// Device-variant fields (e.g. `Modem`), carried verbatim.
    pub extra: BTreeMap<String, String>,
}

impl ControlParams {
    #[must_use]
    pub fn nominal() -> Self {
        Self {
            frequency: Sanitized::stored(DEFAULT_FREQUENCY),
            transmission_power: Sanitized::stored(DEFAULT_TRANSMISSION_POWER),
            enabled: Sanitized::stored(DEFAULT_ENABLED),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            frequency: Sanitized::stored(0),
            transmission_power: Sanitized::stored(0),
            enabled: Sanitized::stored(false),
            extra: BTreeMap::new(),
        }
    }
}

/// Identity and status fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub device_type: String,
    pub status: Sanitized<DeviceStatus>,
    /// Process start of the engine that produced this record; never read from storage.
    pub start_time: String,
    pub version: String,
    pub device_type_hash: String,
    pub unique_id: String,
}

/// Alert sub-state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertState {
    pub level: Sanitized<AlertLevel>,
    pub message: String,
}

// ──────────────────── record ────────────────────

/// In-memory representation of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub telemetry: Telemetry,
    pub control: ControlParams,
    pub reference: Reference,
    pub alert: AlertState,
}

impl DeviceRecord {
    /// Fully defaulted record, as seen for a device with no documents.
    #[must_use]
    pub fn defaults(device_id: DeviceId, start_time: &str) -> Self {
        Self {
            reference: Reference {
                device_type: device_id.as_str().to_string(),
                status: Sanitized::stored(DeviceStatus::Operational),
                start_time: start_time.to_string(),
                version: DEFAULT_VERSION.to_string(),
                device_type_hash: DEFAULT_DEVICE_TYPE_HASH.to_string(),
                unique_id: DEFAULT_UNIQUE_ID.to_string(),
            },
            device_id,
            telemetry: Telemetry::nominal(),
            control: ControlParams::nominal(),
            alert: AlertState {
                level: Sanitized::stored(AlertLevel::Info),
                message: DEFAULT_ALERT_MESSAGE.to_string(),
            },
        }
    }

    /// Build a normalized record from a raw wire mapping.
    ///
    /// `extra_control` names the device-variant control fields to carry over.
    #[must_use]
    pub fn from_fields(
        device_id: DeviceId,
        fields: &FieldMap,
        extra_control: &[String],
        start_time: &str,
    ) -> Self {
        validation::normalize(device_id, fields, extra_control, start_time)
    }

    /// Wire representation of a single built-in field.
    #[must_use]
    pub fn field(&self, field: FieldName) -> String {
        match field {
            FieldName::Vswr => self.telemetry.vswr.get().to_string(),
            FieldName::PowerSupplyVoltage => self.telemetry.power_supply_voltage.get().to_string(),
            FieldName::PowerSupplyConsumption => {
                self.telemetry.power_supply_consumption.get().to_string()
            }
            FieldName::Temperature => self.telemetry.temperature.get().to_string(),
            FieldName::SignalLevel => self.telemetry.signal_level.get().to_string(),
            FieldName::Frequency => self.control.frequency.get().to_string(),
            FieldName::TransmissionPower => self.control.transmission_power.get().to_string(),
            FieldName::Enabled => self.control.enabled.get().to_string(),
            FieldName::DeviceType => self.reference.device_type.clone(),
            FieldName::Status => self.reference.status.get().to_string(),
            FieldName::StartTime => self.reference.start_time.clone(),
            FieldName::Version => self.reference.version.clone(),
            FieldName::DeviceTypeHash => self.reference.device_type_hash.clone(),
            FieldName::UniqueId => self.reference.unique_id.clone(),
            FieldName::Alert => self.alert.level.get().to_string(),
            FieldName::AlertMessage => self.alert.message.clone(),
        }
    }

    /// Look up a parameter by wire or snake_case name, including extra control fields.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        FieldName::from_key(name)
            .map(|field| self.field(field))
            .or_else(|| self.control.extra.get(name).cloned())
    }

    /// Full wire mapping: every built-in field plus extra control fields.
    #[must_use]
    pub fn to_fields(&self) -> FieldMap {
        let mut out = self.fields_of(&FieldName::ALL);
        out.extend(
            self.control
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        out
    }

    /// Telemetry-only view.
    #[must_use]
    pub fn telemetry_fields(&self) -> FieldMap {
        self.fields_of(&FieldName::TELEMETRY)
    }

    /// Reference and alert view (everything an operator dashboard shows besides readings).
    #[must_use]
    pub fn reference_fields(&self) -> FieldMap {
        let mut out = self.fields_of(&[
            FieldName::Status,
            FieldName::Version,
            FieldName::DeviceTypeHash,
            FieldName::UniqueId,
            FieldName::StartTime,
        ]);
        out.extend(self.fields_of(&FieldName::ALERT));
        out
    }

    fn fields_of(&self, fields: &[FieldName]) -> FieldMap {
        fields
            .iter()
            .map(|f| (f.wire_name().to_string(), self.field(*f)))
            .collect()
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.reference.status.get() == DeviceStatus::Operational
    }

    /// Fields whose stored value was rejected and replaced by a default.
    #[must_use]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut out: Vec<Anomaly> = self
            .telemetry
            .iter()
            .filter_map(|(field, value)| {
                value.rejected_raw().map(|raw| Anomaly::MalformedField {
                    field,
                    raw: raw.to_string(),
                })
            })
            .collect();

        let rejected = [
            (FieldName::Frequency, self.control.frequency.rejected_raw()),
            (
                FieldName::TransmissionPower,
                self.control.transmission_power.rejected_raw(),
            ),
            (FieldName::Enabled, self.control.enabled.rejected_raw()),
            (FieldName::Status, self.reference.status.rejected_raw()),
            (FieldName::Alert, self.alert.level.rejected_raw()),
        ];
        out.extend(rejected.into_iter().filter_map(|(field, raw)| {
            raw.map(|raw| Anomaly::MalformedField {
                field,
                raw: raw.to_string(),
            })
        }));
        out
    }

    /// Fields that were defaulted because their stored value was malformed.
    #[must_use]
    pub fn defaulted_fields(&self) -> Vec<FieldName> {
        self.anomalies()
            .into_iter()
            .filter_map(|a| match a {
                Anomaly::MalformedField { field, .. } => Some(field),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> DeviceId {
        DeviceId::parse(raw).expect("valid id")
    }

    #[test]
    fn device_id_accepts_routing_alphabet() {
        assert!(DeviceId::parse("radio1").is_ok());
        assert!(DeviceId::parse("Radio_2-b").is_ok());
    }

    #[test]
    fn device_id_rejects_path_characters() {
        for bad in ["", "../etc", "a/b", "a.b", "radio 1", &"x".repeat(65)] {
            let err = DeviceId::parse(bad).expect_err("should reject");
            assert_eq!(err.code(), "RDS-1101", "id {bad:?}");
        }
    }

    #[test]
    fn field_lookup_accepts_wire_and_snake_names() {
        assert_eq!(FieldName::from_key("Frequency"), Some(FieldName::Frequency));
        assert_eq!(FieldName::from_key("frequency"), Some(FieldName::Frequency));
        assert_eq!(FieldName::from_key("UniqueID"), Some(FieldName::UniqueId));
        assert_eq!(FieldName::from_wire("frequency"), None);
        assert_eq!(FieldName::from_key("Modem"), None);
    }

    #[test]
    fn field_groups_partition_all_fields() {
        let total = FieldName::TELEMETRY.len()
            + FieldName::CONTROL.len()
            + FieldName::REFERENCE.len()
            + FieldName::ALERT.len();
        assert_eq!(total, FieldName::ALL.len());
    }

    #[test]
    fn status_accepts_legacy_spellings() {
        let parse = |raw: &str| raw.parse::<DeviceStatus>();
        assert_eq!(parse("Not Operational"), Ok(DeviceStatus::NotOperational));
        assert_eq!(parse("OFFLINE"), Ok(DeviceStatus::NotOperational));
        assert_eq!(parse("NotOperational"), Ok(DeviceStatus::NotOperational));
        assert_eq!(parse("Operational"), Ok(DeviceStatus::Operational));
        assert!("broken".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn alert_level_parse_is_exact() {
        assert_eq!("Severe".parse::<AlertLevel>(), Ok(AlertLevel::Severe));
        assert!("severe".parse::<AlertLevel>().is_err());
        assert!("NONE".parse::<AlertLevel>().is_err());
    }

    #[test]
    fn defaults_match_table() {
        let rec = DeviceRecord::defaults(id("radio1"), "2026-01-01 00:00:00");
        let fields = rec.to_fields();
        assert_eq!(fields["VSWR"], "50");
        assert_eq!(fields["PowerSupplyVoltage"], "200");
        assert_eq!(fields["PowerSupplyConsumption"], "50000");
        assert_eq!(fields["Temperature"], "100");
        assert_eq!(fields["SignalLevel"], "5");
        assert_eq!(fields["Frequency"], "12000");
        assert_eq!(fields["TransmissionPower"], "10000");
        assert_eq!(fields["Enabled"], "true");
        assert_eq!(fields["Version"], "1.0");
        assert_eq!(fields["Status"], "Operational");
        assert_eq!(fields["Alert"], "Info");
        assert_eq!(fields["AlertMessage"], DEFAULT_ALERT_MESSAGE);
        assert_eq!(fields["DeviceType"], "radio1");
        assert!(rec.anomalies().is_empty());
    }

    #[test]
    fn param_lookup_covers_extra_control_fields() {
        let mut rec = DeviceRecord::defaults(id("radio1"), "");
        rec.control
            .extra
            .insert("Modem".to_string(), "QPSK".to_string());
        assert_eq!(rec.param("Modem").as_deref(), Some("QPSK"));
        assert_eq!(rec.param("signal_level").as_deref(), Some("5"));
        assert_eq!(rec.param("Nope"), None);
    }

    #[test]
    fn views_are_disjoint_subsets() {
        let rec = DeviceRecord::defaults(id("radio1"), "");
        let telemetry = rec.telemetry_fields();
        let reference = rec.reference_fields();
        assert_eq!(telemetry.len(), 5);
        assert!(reference.contains_key("Alert"));
        assert!(telemetry.keys().all(|k| !reference.contains_key(k)));
    }

    #[test]
    fn sanitized_reports_rejected_raw() {
        let value = Sanitized::rejected(50_i64, "abc");
        assert!(value.was_rejected());
        assert_eq!(value.rejected_raw(), Some("abc"));
        assert_eq!(value.get(), 50);
        assert!(!Sanitized::absent(1_i64).was_rejected());
    }
}
