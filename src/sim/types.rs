//! Core simulation types: timing configuration, controller contracts, step records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::types::ModuleSnapshot;

/// Centralized simulation timing.
///
/// Every module and the engine read `dt_hours` from here so that power (kW)
/// and energy (kWh) conversions agree.
///
/// # Examples
///
/// ```
/// use microgrid_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(24, 48, 42);
/// assert_eq!(cfg.dt_hours, 1.0);
/// assert_eq!(cfg.total_steps(), 48);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    /// Number of ticks per simulated day.
    pub steps_per_day: usize,
    /// Number of ticks to run.
    pub steps: usize,
    /// Duration of one tick in hours, derived as `24.0 / steps_per_day`.
    pub dt_hours: f64,
    /// Master random seed for reproducibility.
    pub seed: u64,
}

impl SimConfig {
    /// Creates a new timing configuration.
    ///
    /// # Panics
    ///
    /// Panics if `steps_per_day` or `steps` is zero.
    pub fn new(steps_per_day: usize, steps: usize, seed: u64) -> Self {
        assert!(steps_per_day > 0, "steps_per_day must be > 0");
        assert!(steps > 0, "steps must be > 0");
        Self {
            steps_per_day,
            steps,
            dt_hours: 24.0 / steps_per_day as f64,
            seed,
        }
    }

    /// Total number of ticks in the run.
    pub fn total_steps(&self) -> usize {
        self.steps
    }
}

/// Measured demand and production for one tick, fed to the controller.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// Current tick index.
    pub timestep: usize,
    /// Total demand: compute nodes plus base load (kW, >= 0).
    pub load_kw: f64,
    /// Available renewable production (kW, >= 0).
    pub renewable_kw: f64,
    /// Battery state of charge before this tick (0.0 to 1.0).
    pub battery_soc: f64,
}

/// Feasible power limits for this tick.
///
/// Battery limits already account for state of charge and efficiency.
#[derive(Debug, Clone)]
pub struct StepLimits {
    /// Maximum feasible battery charging power (kW, >= 0).
    pub max_charge_kw: f64,
    /// Maximum feasible battery discharging power (kW, >= 0).
    pub max_discharge_kw: f64,
    /// Grid import limit (kW, >= 0).
    pub max_import_kw: f64,
    /// Grid export limit (kW, >= 0).
    pub max_export_kw: f64,
}

/// Controller dispatch decisions for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    /// Battery power (kW; positive = charge, negative = discharge).
    pub battery_kw: f64,
    /// Power drawn from the grid (kW, >= 0).
    pub import_kw: f64,
    /// Power fed into the grid (kW, >= 0).
    pub export_kw: f64,
    /// Renewable production left unused (kW, >= 0).
    pub curtailment_kw: f64,
    /// Demand left unserved (kW, >= 0).
    pub loss_load_kw: f64,
}

impl Dispatch {
    /// Charging component of `battery_kw`.
    pub fn charge_kw(&self) -> f64 {
        self.battery_kw.max(0.0)
    }

    /// Discharging component of `battery_kw` as a positive magnitude.
    pub fn discharge_kw(&self) -> f64 {
        (-self.battery_kw).max(0.0)
    }
}

/// Complete record of one microgrid tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    /// Tick index.
    pub timestep: usize,
    /// Simulated time in hours.
    pub time_hr: f64,
    /// Total demand (kW).
    pub load_kw: f64,
    /// Compute-node share of the demand (kW).
    pub node_load_kw: f64,
    /// Available renewable production (kW).
    pub renewable_kw: f64,
    /// Renewable production actually used, stored or exported (kW).
    pub renewable_used_kw: f64,
    /// Curtailed renewable production (kW).
    pub curtailment_kw: f64,
    /// Battery power (kW; positive = charge, negative = discharge).
    pub battery_kw: f64,
    /// Battery state of charge after this tick.
    pub battery_soc: f64,
    /// Stored energy after this tick (kWh).
    pub battery_charge_kwh: f64,
    /// Grid import (kW).
    pub grid_import_kw: f64,
    /// Grid export (kW).
    pub grid_export_kw: f64,
    /// Unserved demand (kW).
    pub loss_load_kw: f64,
    /// Net energy cost for this tick (import cost minus export revenue).
    pub cost: f64,
    /// CO2 emitted by grid imports this tick (kg).
    pub co2_kg: f64,
    /// Negative cost.
    pub reward: f64,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} ({:>5.1}h) | load={:>6.2} kW  pv={:>6.2} kW (curtail={:.2}) | \
             bat={:>6.2} kW (SoC={:.1}%) | grid +{:.2}/-{:.2} kW | loss={:.2} cost={:.4}",
            self.timestep,
            self.time_hr,
            self.load_kw,
            self.renewable_kw,
            self.curtailment_kw,
            self.battery_kw,
            self.battery_soc * 100.0,
            self.grid_import_kw,
            self.grid_export_kw,
            self.loss_load_kw,
            self.cost,
        )
    }
}

/// Latest snapshot of one microgrid, as posted to the HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridState {
    /// Grid name (e.g. `"ES10"`).
    pub name: String,
    /// Battery state of charge (0.0 to 1.0).
    pub soc: f64,
    /// Stored energy (kWh).
    pub current_charge_kwh: f64,
    /// Compute-node loads in kW keyed by node name, in configuration order.
    pub nodes: Vec<NodeLoad>,
    /// Renewable forecast for the coming ticks (kW), empty without a forecaster.
    pub renewable_forecast_kw: Vec<f64>,
    /// Record of the last tick, if any.
    pub last_step: Option<StepRecord>,
    /// Snapshot of every module, battery first.
    pub modules: Vec<ModuleSnapshot>,
}

/// A node's load as reported in [`GridState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeLoad {
    pub name: String,
    pub cpu_pct: f64,
    pub load_kw: f64,
}

/// Aggregated state of every microgrid after one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridsState {
    /// Wall-clock time the tick completed.
    pub timestamp: DateTime<Utc>,
    /// Tick index.
    pub step: usize,
    /// One entry per microgrid, in configuration order.
    pub grids: Vec<GridState>,
}
