//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{RdsError, Result};
use crate::core::paths::resolve_absolute_path;

/// Full store configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    pub simulator: SimulatorConfig,
    pub paths: PathsConfig,
}

/// Where and how device documents are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the `<device><suffix>` documents.
    pub data_dir: PathBuf,
    pub status_suffix: String,
    pub control_suffix: String,
    pub alert_suffix: String,
    /// Take an advisory `flock` on `<device>.lock` so separate processes serialize too.
    pub lock_files: bool,
}

/// Device-variant knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DeviceConfig {
    /// Additional control fields (e.g. `Modem`, `Antenna`) accepted by patches and
    /// carried verbatim in the control document.
    pub extra_control_fields: Vec<String>,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

/// Telemetry simulator knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Per-tick probability that one field is pushed outside its valid range.
    pub excursion_probability: f64,
    /// Relative random-walk step, as a fraction of the field's nominal value.
    pub jitter_pct: f64,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Well-known file locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[RDS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_home() -> PathBuf {
    home_dir().join(".local").join("share").join("rds")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: data_home().join("devices"),
            status_suffix: ".status".to_string(),
            control_suffix: ".control".to_string(),
            alert_suffix: ".alert".to_string(),
            lock_files: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: data_home().join("activity.jsonl"),
            fallback_path: None,
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 5,
            fsync_interval_secs: 10,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            excursion_probability: 0.05,
            jitter_pct: 0.02,
            seed: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir().join(".config").join("rds").join("config.toml"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| RdsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(RdsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON, stable across processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // storage
        if let Some(raw) = lookup("RDS_STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RDS_STORAGE_LOCK_FILES") {
            self.storage.lock_files = parse_env("RDS_STORAGE_LOCK_FILES", &raw)?;
        }

        // logging
        if let Some(raw) = lookup("RDS_LOGGING_ENABLED") {
            self.logging.enabled = parse_env("RDS_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("RDS_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RDS_LOGGING_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env("RDS_LOGGING_MAX_SIZE_BYTES", &raw)?;
        }

        // simulator
        if let Some(raw) = lookup("RDS_SIMULATOR_EXCURSION_PROBABILITY") {
            self.simulator.excursion_probability =
                parse_env("RDS_SIMULATOR_EXCURSION_PROBABILITY", &raw)?;
        }
        if let Some(raw) = lookup("RDS_SIMULATOR_JITTER_PCT") {
            self.simulator.jitter_pct = parse_env("RDS_SIMULATOR_JITTER_PCT", &raw)?;
        }
        if let Some(raw) = lookup("RDS_SIMULATOR_SEED") {
            self.simulator.seed = Some(parse_env("RDS_SIMULATOR_SEED", &raw)?);
        }
        Ok(())
    }

    /// Resolve relative paths against the working directory so every component
    /// agrees on where a device's documents live.
    fn normalize_paths(&mut self) {
        self.storage.data_dir = resolve_absolute_path(&self.storage.data_dir);
        self.logging.jsonl_path = resolve_absolute_path(&self.logging.jsonl_path);
        if let Some(fallback) = self.logging.fallback_path.as_mut() {
            *fallback = resolve_absolute_path(fallback);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let suffixes = [
            ("storage.status_suffix", &self.storage.status_suffix),
            ("storage.control_suffix", &self.storage.control_suffix),
            ("storage.alert_suffix", &self.storage.alert_suffix),
        ];
        let mut seen = HashSet::new();
        for (name, suffix) in suffixes {
            if suffix.is_empty() {
                return Err(RdsError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
            if suffix.contains(['/', '\\']) {
                return Err(RdsError::InvalidConfig {
                    details: format!("{name} must not contain path separators, got {suffix:?}"),
                });
            }
            if suffix == ".lock" || suffix == ".tmp" {
                return Err(RdsError::InvalidConfig {
                    details: format!("{name} collides with a reserved suffix: {suffix:?}"),
                });
            }
            if !seen.insert(suffix.as_str()) {
                return Err(RdsError::InvalidConfig {
                    details: format!("document suffixes must be distinct; {suffix:?} repeats"),
                });
            }
        }

        let mut extra = HashSet::new();
        for field in &self.device.extra_control_fields {
            if field.is_empty() || field.contains([']', '[', '\n']) {
                return Err(RdsError::InvalidConfig {
                    details: format!(
                        "device.extra_control_fields entries must be non-empty and bracket-free, got {field:?}"
                    ),
                });
            }
            if crate::store::record::FieldName::from_wire(field).is_some() {
                return Err(RdsError::InvalidConfig {
                    details: format!(
                        "device.extra_control_fields entry {field:?} shadows a built-in field"
                    ),
                });
            }
            if !extra.insert(field.as_str()) {
                return Err(RdsError::InvalidConfig {
                    details: format!("device.extra_control_fields repeats {field:?}"),
                });
            }
        }

        if self.logging.max_size_bytes == 0 {
            return Err(RdsError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }

        validate_prob(
            "simulator.excursion_probability",
            self.simulator.excursion_probability,
        )?;
        if !(0.0..=1.0).contains(&self.simulator.jitter_pct) {
            return Err(RdsError::InvalidConfig {
                details: format!(
                    "simulator.jitter_pct must be in [0, 1], got {}",
                    self.simulator.jitter_pct
                ),
            });
        }

        Ok(())
    }
}

fn validate_prob(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RdsError::InvalidConfig {
            details: format!("{name} must be in [0,1], got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| RdsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
