//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{ColoredString, Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use radio_device_store::core::config::Config;
use radio_device_store::core::errors::RdsError;
use radio_device_store::core::paths::resolve_absolute_path;
use radio_device_store::simulator::TelemetrySimulator;
use radio_device_store::store::engine::{DeviceStore, PatchReport};
use radio_device_store::store::patch::ControlPatch;
use radio_device_store::store::record::{
    AlertLevel, Anomaly, DeviceId, DeviceRecord, FieldMap, FieldName,
};
use radio_device_store::store::validation::{LimitViolation, limit_for};

/// Radio Device Store: inspect and drive simulated radio devices.
#[derive(Debug, Parser)]
#[command(
    name = "rds",
    author,
    version,
    about = "Radio Device Store - device parameters, limits and alerts",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the directory holding device documents.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show every parameter of a device.
    Show(DeviceArgs),
    /// Show telemetry readings and whether they are within limits.
    Status(DeviceArgs),
    /// Show reference and alert fields.
    Ref(DeviceArgs),
    /// Show a single parameter.
    Param(ParamArgs),
    /// Save a full record, overriding the given fields.
    Save(SaveArgs),
    /// Apply a partial control update.
    Patch(PatchArgs),
    /// Restore all parameters to their defaults.
    Reset(DeviceArgs),
    /// Force the device into the powered-off state.
    PowerOff(DeviceArgs),
    /// Check telemetry limits; exits 2 when any reading is out of range.
    Check(DeviceArgs),
    /// Feed simulated telemetry through the save path.
    Simulate(SimulateArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
}

#[derive(Debug, Clone, Args)]
struct DeviceArgs {
    /// Device identifier ([A-Za-z0-9_-], at most 64 characters).
    device: String,
}

#[derive(Debug, Clone, Args)]
struct ParamArgs {
    device: String,
    /// Parameter name (wire name such as `Frequency`, or `frequency`).
    name: String,
}

#[derive(Debug, Clone, Args)]
struct SaveArgs {
    device: String,
    /// Field override, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,
}

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["assignments", "body"])))]
struct PatchArgs {
    device: String,
    /// Control field updates.
    #[arg(value_name = "KEY=VALUE", value_parser = parse_assignment)]
    assignments: Vec<(String, String)>,
    /// JSON object body; `-` reads it from stdin.
    #[arg(long, value_name = "JSON")]
    body: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct SimulateArgs {
    device: String,
    /// Number of snapshots to generate.
    #[arg(long, default_value_t = 1)]
    ticks: u64,
    /// Seed for a reproducible run (overrides `simulator.seed`).
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Args)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input.
    #[error("{0}")]
    User(String),
    /// Storage or environment failure.
    #[error("{0}")]
    Runtime(String),
    /// Telemetry out of range (reported by `check`).
    #[error("{0}")]
    LimitsViolated(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::LimitsViolated(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<RdsError> for CliError {
    fn from(err: RdsError) -> Self {
        match err {
            RdsError::InvalidConfig { .. }
            | RdsError::MissingConfig { .. }
            | RdsError::ConfigParse { .. }
            | RdsError::InvalidDeviceId { .. }
            | RdsError::Serialization { .. } => Self::User(err.to_string()),
            RdsError::StorageUnavailable { .. }
            | RdsError::Io { .. }
            | RdsError::LockFailed { .. } => Self::Runtime(err.to_string()),
            RdsError::Runtime { .. } => Self::Internal(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Show(args) => run_show(cli, args),
        Command::Status(args) => run_status(cli, args),
        Command::Ref(args) => run_ref(cli, args),
        Command::Param(args) => run_param(cli, args),
        Command::Save(args) => run_save(cli, args),
        Command::Patch(args) => run_patch(cli, args),
        Command::Reset(args) => run_lifecycle(cli, args, "reset"),
        Command::PowerOff(args) => run_lifecycle(cli, args, "power-off"),
        Command::Check(args) => run_check(cli, args),
        Command::Simulate(args) => run_simulate(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
        Command::Version(args) => emit_version(cli, args),
    }
}

// ──────────────────── setup ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = resolve_absolute_path(dir);
    }
    Ok(config)
}

fn open_store(cli: &Cli, device: &str) -> Result<(Config, DeviceStore, DeviceId), CliError> {
    let device = DeviceId::parse(device)?;
    let config = load_config(cli)?;
    let store = DeviceStore::open(&config);
    Ok((config, store, device))
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

// ──────────────────── read views ────────────────────

fn run_show(cli: &Cli, args: &DeviceArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let report = store.load_with_report(&device);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", format!("Device {device}").bold());
            print_fields(&report.record.to_fields());
            print_alert(&report.record);
            for anomaly in &report.anomalies {
                if let Some(note) = human_anomaly(anomaly) {
                    println!("  {} {note}", "note:".dimmed());
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "show",
                "device": device.as_str(),
                "params": report.record.to_fields(),
                "anomalies": report.anomalies.iter().map(anomaly_json).collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_status(cli: &Cli, args: &DeviceArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let record = store.load(&device);
    let violations = store.violations(&record);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", format!("Telemetry {device}").bold());
            for (field, value) in record.telemetry.iter() {
                let value = value.get();
                let marker = if violations.iter().any(|v| v.limit.field == field) {
                    "out of range".red()
                } else {
                    "ok".green()
                };
                let range = limit_for(field)
                    .map(|l| format!("[{}, {}]", l.min, l.max))
                    .unwrap_or_default();
                println!("  {:<24} {value:>8}  {range:<16} {marker}", field.wire_name());
            }
            println!("  {:<24} {}", "Status", record.reference.status.get());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "status",
                "device": device.as_str(),
                "telemetry": record.telemetry_fields(),
                "operational": record.is_operational(),
                "within_limits": violations.is_empty(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_ref(cli: &Cli, args: &DeviceArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let record = store.load(&device);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", format!("Reference {device}").bold());
            print_fields(&record.reference_fields());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "ref",
                "device": device.as_str(),
                "params": record.reference_fields(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_param(cli: &Cli, args: &ParamArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let record = store.load(&device);
    let value = record
        .param(&args.name)
        .ok_or_else(|| CliError::User(format!("unknown parameter {:?}", args.name)))?;

    match output_mode(cli) {
        OutputMode::Human => println!("{value}"),
        OutputMode::Json => {
            let payload = json!({
                "command": "param",
                "device": device.as_str(),
                "name": args.name,
                "value": value,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── writes ────────────────────

fn run_save(cli: &Cli, args: &SaveArgs) -> Result<(), CliError> {
    let (config, store, device) = open_store(cli, &args.device)?;
    let extras = &config.device.extra_control_fields;

    let mut overrides = FieldMap::new();
    for (key, value) in &args.set {
        let name = FieldName::from_key(key)
            .map(|f| f.wire_name().to_string())
            .or_else(|| extras.iter().find(|e| *e == key).cloned())
            .ok_or_else(|| CliError::User(format!("unknown field {key:?}")))?;
        overrides.insert(name, value.clone());
    }

    let (saved, defaulted) = store.save_overrides(&device, &overrides)?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Saved {device}.");
            print_alert(&saved);
            for field in defaulted {
                println!(
                    "  {} {field} was not valid and was reset to its default",
                    "note:".dimmed()
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "save",
                "device": device.as_str(),
                "params": saved.to_fields(),
                "within_limits": store.check_limits(&saved),
                "defaulted": defaulted.iter().map(|f| f.wire_name()).collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_patch(cli: &Cli, args: &PatchArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let patch = match &args.body {
        Some(body) if body == "-" => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            ControlPatch::from_json(&raw)?
        }
        Some(body) => ControlPatch::from_json(body)?,
        None => args.assignments.iter().cloned().collect(),
    };
    let report = store.apply_patch(&device, &patch)?;
    emit_patch_report(cli, &device, &report)
}

fn emit_patch_report(cli: &Cli, device: &DeviceId, report: &PatchReport) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            if report.applied.is_empty() {
                println!("No control fields updated on {device}.");
            } else {
                println!("Updated {} on {device}.", report.applied.join(", "));
            }
            for key in &report.ignored {
                println!("  {} ignored unknown control field {key:?}", "note:".dimmed());
            }
            if report.alert_escalated {
                print_alert(&report.record);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "patch",
                "device": device.as_str(),
                "applied": report.applied,
                "ignored": report.ignored,
                "within_limits": report.within_limits,
                "alert_escalated": report.alert_escalated,
                "alert": report.record.alert.level.get().as_str(),
                "alert_message": report.record.alert.message,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_lifecycle(cli: &Cli, args: &DeviceArgs, command: &str) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let record = match command {
        "reset" => store.reset(&device)?,
        "power-off" => store.power_off(&device)?,
        other => return Err(CliError::Internal(format!("unknown lifecycle {other}"))),
    };

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{device}: {} ({})",
                record.reference.status.get(),
                command
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": command,
                "device": device.as_str(),
                "params": record.to_fields(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_check(cli: &Cli, args: &DeviceArgs) -> Result<(), CliError> {
    let (_, store, device) = open_store(cli, &args.device)?;
    let record = store.load(&device);
    let violations = store.violations(&record);

    match output_mode(cli) {
        OutputMode::Human => {
            if violations.is_empty() {
                println!("{} {device}: parameters within range", "OK".green().bold());
            } else {
                println!("{} {device}: parameters beyond range", "FAIL".red().bold());
                for v in &violations {
                    println!("  {}", describe_violation(v));
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "check",
                "device": device.as_str(),
                "operational": record.is_operational(),
                "within_limits": violations.is_empty(),
                "violations": violations.iter().map(|v| json!({
                    "field": v.limit.field.wire_name(),
                    "value": v.value,
                    "min": v.limit.min,
                    "max": v.limit.max,
                })).collect::<Vec<_>>(),
            });
            write_json_line(&payload)?;
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(CliError::LimitsViolated(format!(
            "{device}: {} parameter(s) beyond range",
            violations.len()
        )))
    }
}

fn run_simulate(cli: &Cli, args: &SimulateArgs) -> Result<(), CliError> {
    let (config, store, device) = open_store(cli, &args.device)?;
    let mut sim_config = config.simulator.clone();
    if args.seed.is_some() {
        sim_config.seed = args.seed;
    }
    let mut simulator = TelemetrySimulator::new(&sim_config);
    let summary = simulator.run(&store, &device, args.ticks)?;
    let record = store.load(&device);

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Simulated {} tick(s) on {device}: {} saved, {} skipped (powered off), {} excursion(s).",
                summary.ticks, summary.saved, summary.skipped, summary.excursions
            );
            print_alert(&record);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "simulate",
                "device": device.as_str(),
                "ticks": summary.ticks,
                "saved": summary.saved,
                "skipped": summary.skipped,
                "excursions": summary.excursions,
                "alerts_raised": summary.alerts_raised,
                "telemetry": record.telemetry_fields(),
                "alert": record.alert.level.get().as_str(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── config / version ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match load_config(cli) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("rds {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "rds",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── formatting ────────────────────

fn print_fields(fields: &FieldMap) {
    let width = fields.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in fields {
        println!("  {key:<width$}  {value}");
    }
}

fn print_alert(record: &DeviceRecord) {
    println!(
        "  alert: {} {}",
        color_level(record.alert.level.get()),
        record.alert.message
    );
}

fn color_level(level: AlertLevel) -> ColoredString {
    match level {
        AlertLevel::Info => level.as_str().green(),
        AlertLevel::Warning => level.as_str().yellow(),
        AlertLevel::Error | AlertLevel::Severe | AlertLevel::Critical => level.as_str().red().bold(),
    }
}

fn describe_violation(v: &LimitViolation) -> String {
    format!(
        "{} = {} (valid {}..={})",
        v.limit.field.wire_name(),
        v.value,
        v.limit.min,
        v.limit.max
    )
}

/// Missing documents are routine for a fresh device and are not shown.
fn human_anomaly(anomaly: &Anomaly) -> Option<String> {
    match anomaly {
        Anomaly::MalformedField { field, raw } => {
            Some(format!("{field} had invalid value {raw:?}; default used"))
        }
        Anomaly::UnknownPatchKey { key } => Some(format!("ignored unknown control field {key:?}")),
        Anomaly::MissingDocument { .. } => None,
        Anomaly::UnreadableDocument { kind, details } => Some(format!(
            "{} document unreadable ({details}); defaults used",
            kind.as_str()
        )),
    }
}

fn anomaly_json(anomaly: &Anomaly) -> Value {
    match anomaly {
        Anomaly::MalformedField { field, raw } => {
            json!({ "kind": "malformed_field", "field": field.wire_name(), "raw": raw })
        }
        Anomaly::UnknownPatchKey { key } => json!({ "kind": "unknown_patch_key", "key": key }),
        Anomaly::MissingDocument { kind } => {
            json!({ "kind": "missing_document", "document": kind.as_str() })
        }
        Anomaly::UnreadableDocument { kind, details } => json!({
            "kind": "unreadable_document",
            "document": kind.as_str(),
            "details": details,
        }),
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("RDS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "rds",
            "--config",
            "/tmp/rds.toml",
            "--data-dir",
            "/tmp/devices",
            "--json",
            "--no-color",
            "show",
            "radio1",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["rds", "show", "radio1", "--json", "--no-color"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_full_command_surface() {
        let cases = [
            vec!["rds", "status", "radio1"],
            vec!["rds", "ref", "radio1"],
            vec!["rds", "param", "radio1", "Frequency"],
            vec!["rds", "save", "radio1", "--set", "VSWR=500", "--set", "Alert=Severe"],
            vec!["rds", "patch", "radio1", "Frequency=9000", "enabled=false"],
            vec!["rds", "patch", "radio1", "--body", r#"{"Frequency":"9000"}"#],
            vec!["rds", "reset", "radio1"],
            vec!["rds", "power-off", "radio1"],
            vec!["rds", "check", "radio1"],
            vec!["rds", "simulate", "radio1", "--ticks", "10", "--seed", "7"],
            vec!["rds", "config", "path"],
            vec!["rds", "config", "validate"],
            vec!["rds", "version", "--verbose"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn patch_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["rds", "patch", "radio1"]).is_err());
        assert!(
            Cli::try_parse_from(["rds", "patch", "radio1", "Frequency=1", "--body", "{}"]).is_err()
        );
    }

    #[test]
    fn assignments_must_have_a_key() {
        assert!(Cli::try_parse_from(["rds", "patch", "radio1", "Frequency"]).is_err());
        assert!(Cli::try_parse_from(["rds", "patch", "radio1", "=5"]).is_err());
        assert_eq!(
            parse_assignment("AlertMessage=a=b"),
            Ok(("AlertMessage".to_string(), "a=b".to_string()))
        );
        assert_eq!(
            parse_assignment("Frequency="),
            Ok(("Frequency".to_string(), String::new()))
        );
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["rds", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn store_errors_map_to_exit_codes() {
        let user: CliError = DeviceId::parse("../x").unwrap_err().into();
        assert_eq!(user.exit_code(), 1);

        let storage: CliError = RdsError::storage(
            "/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert_eq!(storage.exit_code(), 2);
        assert_eq!(CliError::LimitsViolated(String::new()).exit_code(), 2);
        assert_eq!(CliError::Internal(String::new()).exit_code(), 3);
    }
}
