//! Telemetry producer feeding the full-record save path.
//!
//! Each tick every telemetry field takes a bounded random step around its
//! current value (relative step size `jitter_pct` of the nominal value, at least
//! one unit), staying inside its valid range. With probability
//! `excursion_probability` one field is instead pushed just outside its range, so
//! the alert derivation gets exercised.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::SimulatorConfig;
use crate::core::errors::Result;
use crate::store::engine::DeviceStore;
use crate::store::record::{AlertLevel, DeviceId, DeviceRecord, FieldName, Telemetry};
use crate::store::validation::{LIMITS, Limit};

/// One generated snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub telemetry: Telemetry,
    /// Field pushed out of range this tick, if any.
    pub excursion: Option<FieldName>,
}

/// Result of one [`TelemetrySimulator::tick`] that saved the device.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub record: DeviceRecord,
    pub excursion: Option<FieldName>,
}

/// Totals over a [`TelemetrySimulator::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    /// Ticks that saved a new snapshot.
    pub saved: u64,
    /// Ticks skipped because the device was powered off.
    pub skipped: u64,
    pub excursions: u64,
    /// Saved snapshots whose alert ended above `Info`.
    pub alerts_raised: u64,
}

/// Random-walk telemetry generator.
#[derive(Debug)]
pub struct TelemetrySimulator {
    rng: StdRng,
    jitter_pct: f64,
    excursion_probability: f64,
}

impl TelemetrySimulator {
    /// Build from configuration; an unset seed draws one from the OS.
    #[must_use]
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            rng,
            jitter_pct: config.jitter_pct.clamp(0.0, 1.0),
            excursion_probability: config.excursion_probability.clamp(0.0, 1.0),
        }
    }

    /// Deterministic simulator for a given seed.
    #[must_use]
    pub fn seeded(seed: u64, jitter_pct: f64, excursion_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
            excursion_probability: excursion_probability.clamp(0.0, 1.0),
        }
    }

    /// Produce the snapshot following `current`.
    pub fn next_snapshot(&mut self, current: &Telemetry) -> Snapshot {
        let nominal = Telemetry::nominal().values();
        let mut values = current.values();
        for (i, limit) in LIMITS.iter().enumerate() {
            values[i] = self.walk(values[i], nominal[i], limit);
        }

        let mut excursion = None;
        if self.rng.random_bool(self.excursion_probability) {
            let i = self.rng.random_range(0..LIMITS.len());
            values[i] = self.outside(&LIMITS[i]);
            excursion = Some(LIMITS[i].field);
        }

        Snapshot {
            telemetry: Telemetry::from_values(values),
            excursion,
        }
    }

    /// Advance `device` by one snapshot through the save path.
    ///
    /// Powered-off devices are left untouched and yield `None`.
    pub fn tick(
        &mut self,
        store: &DeviceStore,
        device: &DeviceId,
    ) -> Result<Option<TickOutcome>> {
        let mut excursion = None;
        let saved = store.update(device, |record| {
            if !record.is_operational() {
                return false;
            }
            let snapshot = self.next_snapshot(&record.telemetry);
            record.telemetry = snapshot.telemetry;
            excursion = snapshot.excursion;
            true
        })?;
        Ok(saved.map(|record| TickOutcome { record, excursion }))
    }

    /// Run `ticks` consecutive ticks, stopping at the first storage error.
    pub fn run(
        &mut self,
        store: &DeviceStore,
        device: &DeviceId,
        ticks: u64,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for _ in 0..ticks {
            summary.ticks += 1;
            match self.tick(store, device)? {
                Some(outcome) => {
                    summary.saved += 1;
                    if outcome.excursion.is_some() {
                        summary.excursions += 1;
                    }
                    if outcome.record.alert.level.get() != AlertLevel::Info {
                        summary.alerts_raised += 1;
                    }
                }
                None => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    fn walk(&mut self, current: i64, nominal: i64, limit: &Limit) -> i64 {
        // A reading outside its range (a previous excursion, or a powered-off
        // zero) restarts from nominal.
        let start = if limit.contains(current) { current } else { nominal };
        let step = step_size(nominal, self.jitter_pct);
        let next = start + self.rng.random_range(-step..=step);
        next.clamp(limit.min, limit.max)
    }

    fn outside(&mut self, limit: &Limit) -> i64 {
        let span = ((limit.max - limit.min) / 10).max(1);
        let overshoot = self.rng.random_range(1..=span);
        if self.rng.random_bool(0.5) {
            limit.max + overshoot
        } else {
            limit.min - overshoot
        }
    }
}

fn step_size(nominal: i64, jitter_pct: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let step = (nominal.unsigned_abs() as f64 * jitter_pct).round() as i64;
    step.max(1)
}
