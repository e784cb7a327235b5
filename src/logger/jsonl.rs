//! JSONL activity log: append-only line-delimited JSON of every device operation.
//!
//! Each line is a self-contained JSON object, assembled in memory and written with
//! a single `write_all` so a reader tailing the file never sees a partial line.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path (e.g. on a different filesystem)
//! 3. stderr with `[RDS-JSONL]` prefix
//! 4. Silent discard (a device operation never fails because of logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{RdsError, Result};
use crate::store::record::Anomaly;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types of the device store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EngineStart,
    DeviceLoad,
    DeviceSave,
    ControlPatch,
    PowerOff,
    Reset,
    FieldDefaulted,
    PatchKeyIgnored,
    DocumentMissing,
    DocumentUnreadable,
    LimitViolation,
    Error,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Device the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Wire name of the field or patch key involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Raw value involved (e.g. the rejected text of a defaulted field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Document kind (`status`, `control`, `alert`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Filesystem path involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Alert level after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    /// Whether telemetry was within limits after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_limits: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// RDS error code if the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            device: None,
            field: None,
            value: None,
            document: None,
            path: None,
            alert: None,
            within_limits: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn device(mut self, device: impl ToString) -> Self {
        self.device = Some(device.to_string());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Entry describing a failed operation.
    #[must_use]
    pub fn failure(device: impl ToString, operation: &str, err: &RdsError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Critical)
            .device(device)
            .details(operation);
        entry.ok = Some(false);
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry
    }

    /// Entry for one absorbed non-fatal condition.
    #[must_use]
    pub fn anomaly(device: impl ToString, anomaly: &Anomaly) -> Self {
        match anomaly {
            Anomaly::MalformedField { field, raw } => {
                let mut entry =
                    Self::new(EventType::FieldDefaulted, Severity::Warning).device(device);
                entry.field = Some(field.wire_name().to_string());
                entry.value = Some(raw.clone());
                entry
            }
            Anomaly::UnknownPatchKey { key } => {
                let mut entry =
                    Self::new(EventType::PatchKeyIgnored, Severity::Info).device(device);
                entry.field = Some(key.clone());
                entry
            }
            Anomaly::MissingDocument { kind } => {
                let mut entry =
                    Self::new(EventType::DocumentMissing, Severity::Info).device(device);
                entry.document = Some(kind.as_str().to_string());
                entry
            }
            Anomaly::UnreadableDocument { kind, details } => {
                let mut entry = Self::new(EventType::DocumentUnreadable, Severity::Warning)
                    .device(device)
                    .details(details.clone());
                entry.document = Some(kind.as_str().to_string());
                entry
            }
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Optional fallback path, tried when the primary cannot be opened.
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls.
    pub fsync_interval_secs: u64,
}

impl From<&LoggingConfig> for JsonlConfig {
    fn from(cfg: &LoggingConfig) -> Self {
        Self {
            path: cfg.jsonl_path.clone(),
            fallback_path: cfg.fallback_path.clone(),
            max_size_bytes: cfg.max_size_bytes,
            max_rotated_files: cfg.max_rotated_files,
            fsync_interval_secs: cfg.fsync_interval_secs,
        }
    }
}

/// Append-only JSONL log writer with rotation and multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
    last_fsync: SystemTime,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
            last_fsync: SystemTime::now(),
        };
        w.try_open_primary();
        w
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[RDS-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Flush and fsync the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
            self.last_fsync = SystemTime::now();
        }
    }

    /// Current degradation state.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Bytes in the current file.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Try to return to the primary path after a degradation.
    pub fn try_recover(&mut self) {
        if self.state == WriterState::Normal {
            return;
        }
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
            self.state = WriterState::Normal;
            self.bytes_written = size;
            let _ = writeln!(
                io::stderr(),
                "[RDS-JSONL] recovered to primary path: {}",
                self.config.path.display()
            );
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && matches!(self.state, WriterState::Normal | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line);
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                    self.maybe_fsync();
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[RDS-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn maybe_fsync(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO);
        if elapsed.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(_) => self.try_open_fallback(),
        }
    }

    fn try_open_fallback(&mut self) {
        let Some(fb) = &self.config.fallback_path else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[RDS-JSONL] primary path failed and no fallback configured, using stderr"
            );
            return;
        };
        match open_append(fb) {
            Ok((file, size)) => {
                let _ = writeln!(
                    io::stderr(),
                    "[RDS-JSONL] primary path failed, using fallback: {}",
                    fb.display()
                );
                self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                self.state = WriterState::Fallback;
                self.bytes_written = size;
            }
            Err(_) => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[RDS-JSONL] both primary and fallback paths failed, using stderr"
                );
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => self.try_open_fallback(),
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[RDS-JSONL] fallback write failed, using stderr"
                );
            }
            WriterState::Stderr => self.state = WriterState::Discard,
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = match self.state {
            WriterState::Normal => self.config.path.clone(),
            WriterState::Fallback => match &self.config.fallback_path {
                Some(p) => p.clone(),
                None => return,
            },
            _ => return,
        };

        // .N is dropped, .N-1 → .N, …, current → .1
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        if self.config.max_rotated_files > 0 {
            let _ = rename(&base, rotated_name(&base, 1));
        } else {
            let _ = fs::remove_file(&base);
        }

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(16 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Shared, thread-safe activity log owned by the engine.
///
/// A disabled log discards every entry without touching the filesystem.
pub struct ActivityLog {
    writer: Option<Mutex<JsonlWriter>>,
}

impl ActivityLog {
    /// Open the log described by `cfg`, or a disabled log when logging is off.
    #[must_use]
    pub fn from_config(cfg: &LoggingConfig) -> Self {
        if cfg.enabled {
            Self::open(JsonlConfig::from(cfg))
        } else {
            Self::disabled()
        }
    }

    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        Self {
            writer: Some(Mutex::new(JsonlWriter::open(config))),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Append and flush one entry, first retrying the primary path if degraded.
    pub fn record(&self, entry: &LogEntry) {
        if let Some(writer) = &self.writer {
            let mut w = writer.lock();
            w.try_recover();
            w.write_entry(entry);
            w.flush();
        }
    }

    /// Degradation state of the underlying writer, `disabled` when off.
    #[must_use]
    pub fn state(&self) -> &'static str {
        self.writer
            .as_ref()
            .map_or("disabled", |w| w.lock().state())
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("state", &self.state())
            .finish()
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RdsError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RdsError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `foo.jsonl` → `foo.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::DocumentKind;
    use crate::store::record::FieldName;

    fn config(path: PathBuf) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 60,
        }
    }

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));

        writer.write_entry(&LogEntry::new(EventType::EngineStart, Severity::Info));
        writer.flush();

        let parsed = lines(&path);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["event"], "engine_start");
        assert_eq!(parsed[0]["severity"], "info");
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig {
            max_size_bytes: 100,
            ..config(path.clone())
        });

        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::DeviceLoad, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(!rotated_name(&path, 4).exists());
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not dir").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig {
            fallback_path: Some(fallback.clone()),
            ..config(blocker.join("primary.jsonl"))
        });

        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::new(EventType::Error, Severity::Warning));
        writer.flush();
        assert_eq!(lines(&fallback).len(), 1);
    }

    #[test]
    fn optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::new(EventType::Reset, Severity::Info));
        writer.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"device\""));
        assert!(!line.contains("\"field\""));
    }

    #[test]
    fn anomaly_entries_carry_field_and_document() {
        let defaulted = LogEntry::anomaly(
            "radio1",
            &Anomaly::MalformedField {
                field: FieldName::Vswr,
                raw: "abc".to_string(),
            },
        );
        assert_eq!(defaulted.event, EventType::FieldDefaulted);
        assert_eq!(defaulted.field.as_deref(), Some("VSWR"));
        assert_eq!(defaulted.value.as_deref(), Some("abc"));

        let missing = LogEntry::anomaly(
            "radio1",
            &Anomaly::MissingDocument {
                kind: DocumentKind::Control,
            },
        );
        assert_eq!(missing.event, EventType::DocumentMissing);
        assert_eq!(missing.document.as_deref(), Some("control"));
    }

    #[test]
    fn failure_entry_records_code() {
        let err = RdsError::Runtime {
            details: "boom".to_string(),
        };
        let entry = LogEntry::failure("radio1", "save", &err);
        assert_eq!(entry.error_code.as_deref(), Some("RDS-3900"));
        assert_eq!(entry.ok, Some(false));
    }

    #[test]
    fn activity_log_flushes_each_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let log = ActivityLog::open(config(path.clone()));
        log.record(&LogEntry::new(EventType::DeviceSave, Severity::Info).device("radio1"));
        let parsed = lines(&path);
        assert_eq!(parsed[0]["device"], "radio1");
        assert_eq!(log.state(), "normal");
    }

    #[test]
    fn activity_log_recovers_primary_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "file, not dir").unwrap();
        let path = blocker.join("activity.jsonl");
        let log = ActivityLog::open(config(path.clone()));
        assert_eq!(log.state(), "stderr");

        fs::remove_file(&blocker).unwrap();
        log.record(&LogEntry::new(EventType::PowerOff, Severity::Info).device("radio1"));
        assert_eq!(log.state(), "normal");
        assert_eq!(lines(&path)[0]["event"], "power_off");
    }

    #[test]
    fn bytes_written_tracks_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("size.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::new(EventType::DeviceLoad, Severity::Info));
        writer.fsync();
        assert_eq!(writer.bytes_written(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = ActivityLog::disabled();
        assert!(!log.is_enabled());
        log.record(&LogEntry::new(EventType::DeviceSave, Severity::Info));
        assert_eq!(log.state(), "disabled");
    }
}
