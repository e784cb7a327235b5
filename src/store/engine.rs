//! Device store engine: load, save, patch, and lifecycle operations over the
//! per-device documents, serialized per device and recorded in the activity log.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::core::config::Config;
use crate::core::errors::{RdsError, Result};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::store::codec;
use crate::store::document::{self, DocumentKind, DocumentLayout, ReadOutcome};
use crate::store::lifecycle::Lifecycle;
use crate::store::locks::{DeviceGuard, DeviceLocks};
use crate::store::patch::{self, ControlPatch};
use crate::store::record::{
    Anomaly, DeviceId, DeviceRecord, FieldMap, FieldName, START_TIME_FORMAT,
};
use crate::store::validation::{self, LimitViolation};

/// A loaded record plus every non-fatal condition absorbed while loading it.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub record: DeviceRecord,
    pub anomalies: Vec<Anomaly>,
}

/// Outcome of a control patch.
#[derive(Debug, Clone)]
pub struct PatchReport {
    /// The record as stored after the patch (and any alert escalation).
    pub record: DeviceRecord,
    /// Wire names of the control fields the patch wrote.
    pub applied: Vec<String>,
    /// Patch keys that matched no control field.
    pub ignored: Vec<String>,
    pub within_limits: bool,
    /// Whether the alert document was rewritten.
    pub alert_escalated: bool,
}

/// The device parameter store.
///
/// Owns the process start time stamped into every record, the document layout,
/// the per-device lock table, and the activity log.
#[derive(Debug)]
pub struct DeviceStore {
    layout: DocumentLayout,
    locks: DeviceLocks,
    log: ActivityLog,
    extra_control: Vec<String>,
    started_at: DateTime<Utc>,
    start_time: String,
}

impl DeviceStore {
    /// Open a store with the activity log from `config`, started now.
    #[must_use]
    pub fn open(config: &Config) -> Self {
        Self::with_log(config, ActivityLog::from_config(&config.logging), Utc::now())
    }

    /// Open a store with an explicit log and start time.
    #[must_use]
    pub fn with_log(config: &Config, log: ActivityLog, started_at: DateTime<Utc>) -> Self {
        let store = Self {
            layout: DocumentLayout::new(&config.storage),
            locks: DeviceLocks::new(config.storage.lock_files),
            log,
            extra_control: config.device.extra_control_fields.clone(),
            started_at,
            start_time: started_at.format(START_TIME_FORMAT).to_string(),
        };
        let hash = config.stable_hash().unwrap_or_else(|_| "unknown".to_string());
        let mut entry = LogEntry::new(EventType::EngineStart, Severity::Info)
            .details(format!("config_hash={hash}"));
        entry.path = Some(store.layout.data_dir().display().to_string());
        store.log.record(&entry);
        store
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `started_at` as written to the `StartTime` field.
    #[must_use]
    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    #[must_use]
    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    #[must_use]
    pub fn extra_control_fields(&self) -> &[String] {
        &self.extra_control
    }

    #[must_use]
    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    // ──────────────────── load ────────────────────

    /// Current record of `device`. Never fails: missing or unreadable documents
    /// yield defaults.
    #[must_use]
    pub fn load(&self, device: &DeviceId) -> DeviceRecord {
        self.load_with_report(device).record
    }

    /// Like [`Self::load`], also returning the absorbed anomalies.
    #[must_use]
    pub fn load_with_report(&self, device: &DeviceId) -> LoadReport {
        let started = Instant::now();
        // Reading unlocked risks a torn view but must not fail the load.
        let _guard = match self.locks.acquire_existing(device, &self.layout.lock_path(device)) {
            Ok(guard) => Some(guard),
            Err(err) => {
                self.log.record(&LogEntry::failure(device, "load_lock", &err));
                None
            }
        };
        let report = self.read_record(device);
        self.log_anomalies(device, &report.anomalies);

        let mut entry = LogEntry::new(EventType::DeviceLoad, Severity::Info)
            .device(device)
            .duration(started.elapsed());
        entry.alert = Some(report.record.alert.level.get().to_string());
        self.log.record(&entry);
        report
    }

    // ──────────────────── save ────────────────────

    /// Persist a full record, deriving its alert state from its telemetry.
    ///
    /// Returns the record as written. `StartTime` and `DeviceType` are always
    /// the engine's values.
    pub fn save(&self, record: &DeviceRecord) -> Result<DeviceRecord> {
        let _guard = self.guard_logged(&record.device_id, "save")?;
        self.write_record(record.clone())
    }

    /// Load, edit, and save `device` under one lock.
    ///
    /// `edit` returns `false` to leave the device untouched; the result is then
    /// `None`.
    pub fn update<F>(&self, device: &DeviceId, edit: F) -> Result<Option<DeviceRecord>>
    where
        F: FnOnce(&mut DeviceRecord) -> bool,
    {
        let _guard = self.guard_logged(device, "update")?;
        let mut report = self.read_record(device);
        self.log_anomalies(device, &report.anomalies);
        if !edit(&mut report.record) {
            return Ok(None);
        }
        self.write_record(report.record).map(Some)
    }

    /// Overlay wire-name `overrides` on the current record of `device` and save
    /// it, all under one lock.
    ///
    /// Returns the saved record and the fields whose override was malformed and
    /// fell back to its default.
    pub fn save_overrides(
        &self,
        device: &DeviceId,
        overrides: &FieldMap,
    ) -> Result<(DeviceRecord, Vec<FieldName>)> {
        let mut defaulted = Vec::new();
        let saved = self.update(device, |record| {
            let mut fields = record.to_fields();
            fields.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
            *record = DeviceRecord::from_fields(
                device.clone(),
                &fields,
                &self.extra_control,
                &self.start_time,
            );
            defaulted = record.defaulted_fields();
            true
        })?;
        let saved = saved.ok_or_else(|| RdsError::Runtime {
            details: format!("save of {device} was declined"),
        })?;
        Ok((saved, defaulted))
    }

    // ──────────────────── patch ────────────────────

    /// Apply a partial control update.
    ///
    /// The control document is rewritten from the current (normalized) control
    /// fields overlaid with the patch values, verbatim. If the reloaded record
    /// is then out of limits the alert document alone is escalated.
    pub fn apply_patch(&self, device: &DeviceId, patch: &ControlPatch) -> Result<PatchReport> {
        let started = Instant::now();
        let _guard = self.guard_logged(device, "patch")?;

        let current = self.read_record(device);
        let baseline = patch::control_baseline(&current.record, &self.extra_control);
        let resolved = patch.resolve(&self.extra_control);
        self.log_anomalies(device, &resolved.anomalies());

        let merged = patch::merge(&baseline, &resolved, &self.extra_control);
        let text = codec::encode_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.write_logged(device, DocumentKind::Control, &text, "patch")?;

        let mut reloaded = self.read_record(device).record;
        let violations = validation::violations(&reloaded);
        let within_limits = violations.is_empty();
        let mut alert_escalated = false;
        if let Some(alert) = validation::escalate_after_patch(&reloaded.alert, within_limits) {
            let text = codec::encode_pairs([
                (FieldName::Alert.wire_name(), alert.level.get().as_str()),
                (FieldName::AlertMessage.wire_name(), alert.message.as_str()),
            ]);
            self.write_logged(device, DocumentKind::Alert, &text, "patch")?;
            reloaded.alert = alert;
            alert_escalated = true;
        }
        self.log_violations(device, &violations);

        let applied: Vec<String> = resolved.updates.keys().cloned().collect();
        let mut entry = LogEntry::new(EventType::ControlPatch, Severity::Info)
            .device(device)
            .duration(started.elapsed())
            .details(format!(
                "applied={} changed={}",
                applied.join(","),
                resolved.changed_fields(&baseline).join(",")
            ));
        entry.alert = Some(reloaded.alert.level.get().to_string());
        entry.within_limits = Some(within_limits);
        entry.ok = Some(true);
        self.log.record(&entry);

        Ok(PatchReport {
            record: reloaded,
            applied,
            ignored: resolved.ignored,
            within_limits,
            alert_escalated,
        })
    }

    /// Apply a patch given as a flat mapping.
    pub fn apply_patch_fields(&self, device: &DeviceId, fields: FieldMap) -> Result<PatchReport> {
        self.apply_patch(device, &ControlPatch::from(fields))
    }

    // ──────────────────── lifecycle ────────────────────

    /// Restore every field of `device` to its default.
    pub fn reset(&self, device: &DeviceId) -> Result<DeviceRecord> {
        self.transition(device, Lifecycle::Reset)
    }

    /// Force `device` into the powered-off state, suspending limit checks.
    pub fn power_off(&self, device: &DeviceId) -> Result<DeviceRecord> {
        self.transition(device, Lifecycle::PowerOff)
    }

    fn transition(&self, device: &DeviceId, lifecycle: Lifecycle) -> Result<DeviceRecord> {
        let started = Instant::now();
        let _guard = self.guard_logged(device, lifecycle.as_str())?;
        let record = lifecycle.record(device.clone(), &self.start_time);
        for (kind, text) in lifecycle.documents(&record) {
            self.write_logged(device, kind, &text, lifecycle.as_str())?;
        }

        let event = match lifecycle {
            Lifecycle::Reset => EventType::Reset,
            Lifecycle::PowerOff => EventType::PowerOff,
        };
        let mut entry = LogEntry::new(event, Severity::Info)
            .device(device)
            .duration(started.elapsed());
        entry.ok = Some(true);
        self.log.record(&entry);

        Ok(self.read_record(device).record)
    }

    // ──────────────────── limits ────────────────────

    /// True when `record`'s telemetry is within limits or the device is powered off.
    #[must_use]
    pub fn check_limits(&self, record: &DeviceRecord) -> bool {
        validation::check_limits(record)
    }

    /// Out-of-range telemetry of `record`.
    #[must_use]
    pub fn violations(&self, record: &DeviceRecord) -> Vec<LimitViolation> {
        validation::violations(record)
    }

    // ──────────────────── internals ────────────────────

    fn guard(&self, device: &DeviceId) -> Result<DeviceGuard> {
        self.locks.acquire(device, &self.layout.lock_path(device))
    }

    fn guard_logged(&self, device: &DeviceId, operation: &str) -> Result<DeviceGuard> {
        self.guard(device).inspect_err(|err| {
            self.log.record(&LogEntry::failure(device, operation, err));
        })
    }

    fn read_record(&self, device: &DeviceId) -> LoadReport {
        let mut fields = FieldMap::new();
        let mut anomalies = Vec::new();
        for kind in DocumentKind::ALL {
            match self.layout.read(device, kind) {
                ReadOutcome::Loaded(doc) => fields.extend(doc),
                ReadOutcome::Missing => anomalies.push(Anomaly::MissingDocument { kind }),
                ReadOutcome::Unreadable(details) => {
                    anomalies.push(Anomaly::UnreadableDocument { kind, details });
                }
            }
        }
        let record = DeviceRecord::from_fields(
            device.clone(),
            &fields,
            &self.extra_control,
            &self.start_time,
        );
        anomalies.extend(record.anomalies());
        LoadReport { record, anomalies }
    }

    fn write_record(&self, mut record: DeviceRecord) -> Result<DeviceRecord> {
        let started = Instant::now();
        let device = record.device_id.clone();
        record.reference.start_time.clone_from(&self.start_time);
        record.reference.device_type = device.as_str().to_string();

        let violations = validation::violations(&record);
        validation::derive_alert(&mut record.alert, violations.is_empty());

        for kind in DocumentKind::ALL {
            let text = document::render(&record, kind, &self.extra_control);
            self.write_logged(&device, kind, &text, "save")?;
        }
        self.log_violations(&device, &violations);

        let mut entry = LogEntry::new(EventType::DeviceSave, Severity::Info)
            .device(&device)
            .duration(started.elapsed());
        entry.alert = Some(record.alert.level.get().to_string());
        entry.within_limits = Some(violations.is_empty());
        entry.ok = Some(true);
        self.log.record(&entry);
        Ok(record)
    }

    fn write_logged(
        &self,
        device: &DeviceId,
        kind: DocumentKind,
        text: &str,
        operation: &str,
    ) -> Result<()> {
        self.layout.write(device, kind, text).inspect_err(|err| {
            let mut entry = LogEntry::failure(device, operation, err);
            entry.document = Some(kind.as_str().to_string());
            self.log.record(&entry);
        })
    }

    fn log_anomalies(&self, device: &DeviceId, anomalies: &[Anomaly]) {
        for anomaly in anomalies {
            self.log.record(&LogEntry::anomaly(device, anomaly));
        }
    }

    fn log_violations(&self, device: &DeviceId, violations: &[LimitViolation]) {
        for v in violations {
            let mut entry = LogEntry::new(EventType::LimitViolation, Severity::Warning)
                .device(device)
                .details(format!("range {}..={}", v.limit.min, v.limit.max));
            entry.field = Some(v.limit.field.wire_name().to_string());
            entry.value = Some(v.value.to_string());
            self.log.record(&entry);
        }
    }
}
