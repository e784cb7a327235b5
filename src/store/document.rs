//! The three per-device documents (status, control, alert) and their file I/O.
//!
//! Reads never fail: a missing or unreadable document is reported as such and the
//! caller treats it as empty. Writes stage the full document next to the target
//! and rename it into place, so a failed write leaves the previous document intact.

#![allow(missing_docs)]

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::core::config::StorageConfig;
use crate::core::errors::{RdsError, Result};
use crate::core::paths::{LOCK_SUFFIX, device_file, staging_path};
use crate::store::codec;
use crate::store::record::{DeviceId, DeviceRecord, FieldMap, FieldName};

/// One of the independently persisted documents of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Status,
    Control,
    Alert,
}

const STATUS_FIELDS: [FieldName; 11] = [
    FieldName::Vswr,
    FieldName::PowerSupplyVoltage,
    FieldName::PowerSupplyConsumption,
    FieldName::Temperature,
    FieldName::SignalLevel,
    FieldName::DeviceType,
    FieldName::Status,
    FieldName::StartTime,
    FieldName::Version,
    FieldName::DeviceTypeHash,
    FieldName::UniqueId,
];

impl DocumentKind {
    pub const ALL: [Self; 3] = [Self::Status, Self::Control, Self::Alert];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Control => "control",
            Self::Alert => "alert",
        }
    }

    /// Built-in fields persisted in this document, in write order.
    #[must_use]
    pub fn fields(self) -> &'static [FieldName] {
        match self {
            Self::Status => &STATUS_FIELDS,
            Self::Control => &FieldName::CONTROL,
            Self::Alert => &FieldName::ALERT,
        }
    }
}

/// Result of reading one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Loaded(FieldMap),
    Missing,
    Unreadable(String),
}

#[cfg(test)]
impl ReadOutcome {
    fn into_fields(self) -> FieldMap {
        match self {
            Self::Loaded(fields) => fields,
            Self::Missing | Self::Unreadable(_) => FieldMap::new(),
        }
    }
}

/// Maps device ids to document paths.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    data_dir: PathBuf,
    status_suffix: String,
    control_suffix: String,
    alert_suffix: String,
}

impl DocumentLayout {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            status_suffix: config.status_suffix.clone(),
            control_suffix: config.control_suffix.clone(),
            alert_suffix: config.alert_suffix.clone(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn path(&self, device: &DeviceId, kind: DocumentKind) -> PathBuf {
        let suffix = match kind {
            DocumentKind::Status => &self.status_suffix,
            DocumentKind::Control => &self.control_suffix,
            DocumentKind::Alert => &self.alert_suffix,
        };
        device_file(&self.data_dir, device.as_str(), suffix)
    }

    #[must_use]
    pub fn lock_path(&self, device: &DeviceId) -> PathBuf {
        device_file(&self.data_dir, device.as_str(), LOCK_SUFFIX)
    }

    /// Read and decode one document.
    #[must_use]
    pub fn read(&self, device: &DeviceId, kind: DocumentKind) -> ReadOutcome {
        read_document(&self.path(device, kind))
    }

    /// Atomically replace one document with `contents`.
    pub fn write(&self, device: &DeviceId, kind: DocumentKind, contents: &str) -> Result<()> {
        if !self.data_dir.is_dir() {
            fs::create_dir_all(&self.data_dir)
                .map_err(|source| RdsError::storage(&self.data_dir, source))?;
        }
        write_document(&self.path(device, kind), contents)
    }
}

/// Render the document of `kind` for `record`.
///
/// `extra_control` orders the device-variant control fields; only those present
/// in the record are written.
#[must_use]
pub fn render(record: &DeviceRecord, kind: DocumentKind, extra_control: &[String]) -> String {
    let mut pairs: Vec<(String, String)> = kind
        .fields()
        .iter()
        .map(|f| (f.wire_name().to_string(), record.field(*f)))
        .collect();
    if kind == DocumentKind::Control {
        pairs.extend(extra_control.iter().filter_map(|name| {
            record
                .control
                .extra
                .get(name)
                .map(|value| (name.clone(), value.clone()))
        }));
    }
    codec::encode_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

fn read_document(path: &Path) -> ReadOutcome {
    match fs::read_to_string(path) {
        Ok(text) => ReadOutcome::Loaded(codec::decode(&text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => ReadOutcome::Missing,
        Err(err) => ReadOutcome::Unreadable(err.to_string()),
    }
}

fn write_document(path: &Path, contents: &str) -> Result<()> {
    let staging = staging_path(path);
    let staged = File::create(&staging).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(source) = staged {
        let _ = fs::remove_file(&staging);
        return Err(RdsError::storage(&staging, source));
    }

    fs::rename(&staging, path).map_err(|source| {
        let _ = fs::remove_file(&staging);
        RdsError::storage(path, source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StorageConfig;

    fn layout(dir: &Path) -> DocumentLayout {
        DocumentLayout::new(&StorageConfig {
            data_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        })
    }

    fn radio() -> DeviceId {
        DeviceId::parse("radio1").unwrap()
    }

    #[test]
    fn paths_use_configured_suffixes() {
        let l = layout(Path::new("/srv/rds"));
        assert_eq!(
            l.path(&radio(), DocumentKind::Control),
            PathBuf::from("/srv/rds/radio1.control")
        );
        assert_eq!(l.lock_path(&radio()), PathBuf::from("/srv/rds/radio1.lock"));
    }

    #[test]
    fn missing_document_is_reported_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = layout(dir.path()).read(&radio(), DocumentKind::Alert);
        assert_eq!(outcome, ReadOutcome::Missing);
        assert!(outcome.into_fields().is_empty());
    }

    #[test]
    fn unreadable_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let l = layout(dir.path());
        // A directory where a file is expected cannot be read as text.
        fs::create_dir(l.path(&radio(), DocumentKind::Status)).unwrap();
        assert!(matches!(
            l.read(&radio(), DocumentKind::Status),
            ReadOutcome::Unreadable(_)
        ));
    }

    #[test]
    fn write_creates_data_dir_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let l = layout(&dir.path().join("nested").join("devices"));
        l.write(&radio(), DocumentKind::Control, "[Frequency][9000]\n")
            .unwrap();

        let path = l.path(&radio(), DocumentKind::Control);
        assert_eq!(fs::read_to_string(&path).unwrap(), "[Frequency][9000]\n");
        assert!(!staging_path(&path).exists());
        assert_eq!(
            l.read(&radio(), DocumentKind::Control).into_fields()["Frequency"],
            "9000"
        );
    }

    #[cfg(unix)]
    #[test]
    fn write_into_unwritable_location_is_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let l = layout(&blocker.join("devices"));

        let err = l
            .write(&radio(), DocumentKind::Status, "[VSWR][1]\n")
            .expect_err("data dir under a file cannot be created");
        assert!(err.is_storage_failure(), "unexpected error: {err}");
    }

    #[test]
    fn render_status_carries_telemetry_then_reference() {
        let rec = DeviceRecord::defaults(radio(), "2026-01-01 00:00:00");
        let text = render(&rec, DocumentKind::Status, &[]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[VSWR][50]");
        assert_eq!(lines[5], "[DeviceType][radio1]");
        assert_eq!(lines.len(), STATUS_FIELDS.len());
    }

    #[test]
    fn render_control_appends_configured_extras_in_order() {
        let mut rec = DeviceRecord::defaults(radio(), "");
        rec.control
            .extra
            .insert("Antenna".to_string(), "A2".to_string());
        rec.control
            .extra
            .insert("Modem".to_string(), "QPSK".to_string());
        let order = vec!["Modem".to_string(), "Antenna".to_string()];
        assert_eq!(
            render(&rec, DocumentKind::Control, &order),
            "[Frequency][12000]\n[TransmissionPower][10000]\n[Enabled][true]\n[Modem][QPSK]\n[Antenna][A2]\n"
        );
    }
}
