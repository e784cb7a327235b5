#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use radio_device_store::core::config::{Config, StorageConfig};
use radio_device_store::logger::jsonl::ActivityLog;
use radio_device_store::store::engine::DeviceStore;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    /// Parse the single JSON line the command printed.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(self.stdout.trim()).unwrap_or_else(|e| {
            panic!(
                "stdout is not one JSON line ({e}); log: {}",
                self.log_path.display()
            )
        })
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_rds") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "rds.exe" } else { "rds" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve rds binary path for integration test"),
    }
}

/// Run `rds` with `home` as `$HOME` so config and activity log stay inside it.
pub fn run_cli_case(case_name: &str, home: &Path, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("rds-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("HOME", home)
        .env_remove("RDS_OUTPUT_FORMAT")
        .env_remove("RDS_STORAGE_DATA_DIR")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute rds command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Config rooted at `data_dir`, with the given device-variant control fields.
pub fn config_in(data_dir: &Path, extra_control_fields: &[&str]) -> Config {
    let mut config = Config {
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
            ..StorageConfig::default()
        },
        ..Config::default()
    };
    config.device.extra_control_fields = extra_control_fields
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    config.logging.jsonl_path = data_dir.join("activity.jsonl");
    config
}

/// Store over `data_dir` with logging into `<data_dir>/activity.jsonl`.
pub fn store_in(data_dir: &Path) -> DeviceStore {
    let config = config_in(data_dir, &[]);
    DeviceStore::open(&config)
}

/// Store over `data_dir` that logs nothing.
pub fn quiet_store(data_dir: &Path, extra_control_fields: &[&str]) -> DeviceStore {
    let config = config_in(data_dir, extra_control_fields);
    DeviceStore::with_log(&config, ActivityLog::disabled(), chrono::Utc::now())
}
