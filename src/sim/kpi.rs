//! Post-hoc KPI computation from a grid's step log.

use std::fmt;

use serde::Serialize;

use super::types::StepRecord;

/// Aggregate indicators for one microgrid run.
///
/// Computed post-hoc from the `StepRecord` log so that the report always
/// agrees with the exported step data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KpiReport {
    /// Number of ticks covered.
    pub steps: usize,
    /// Energy drawn from the grid (kWh).
    pub imported_kwh: f64,
    /// Energy fed into the grid (kWh).
    pub exported_kwh: f64,
    /// Import cost minus export revenue.
    pub total_cost: f64,
    /// CO2 emitted by imports (kg).
    pub total_co2_kg: f64,
    /// Renewable energy left unused (kWh).
    pub curtailed_kwh: f64,
    /// Demand left unserved (kWh).
    pub unmet_kwh: f64,
    /// Total battery energy throughput (kWh, sum of |power| * dt).
    pub battery_throughput_kwh: f64,
    /// Battery equivalent full cycles (throughput / 2*capacity).
    pub battery_equivalent_full_cycles: f64,
    pub min_soc: f64,
    pub max_soc: f64,
    /// Share of served load covered by renewable production (0.0-1.0).
    pub renewable_fraction: f64,
}

impl KpiReport {
    /// Computes all KPIs from a step log.
    ///
    /// # Arguments
    ///
    /// * `records` - Step log of one grid
    /// * `dt_hours` - Timestep duration in hours
    /// * `battery_capacity_kwh` - Battery capacity for cycle calculation
    pub fn from_records(records: &[StepRecord], dt_hours: f64, battery_capacity_kwh: f64) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut report = Self {
            steps: records.len(),
            min_soc: f64::INFINITY,
            max_soc: f64::NEG_INFINITY,
            ..Self::default()
        };
        let mut served_kwh = 0.0;
        let mut renewable_to_load_kwh = 0.0;

        for r in records {
            report.imported_kwh += r.grid_import_kw * dt_hours;
            report.exported_kwh += r.grid_export_kw * dt_hours;
            report.total_cost += r.cost;
            report.total_co2_kg += r.co2_kg;
            report.curtailed_kwh += r.curtailment_kw * dt_hours;
            report.unmet_kwh += r.loss_load_kw * dt_hours;
            report.battery_throughput_kwh += r.battery_kw.abs() * dt_hours;
            report.min_soc = report.min_soc.min(r.battery_soc);
            report.max_soc = report.max_soc.max(r.battery_soc);

            let served = (r.load_kw - r.loss_load_kw).max(0.0);
            served_kwh += served * dt_hours;
            renewable_to_load_kwh += r.renewable_used_kw.min(served) * dt_hours;
        }

        if battery_capacity_kwh > 0.0 {
            report.battery_equivalent_full_cycles =
                report.battery_throughput_kwh / (2.0 * battery_capacity_kwh);
        }
        if served_kwh > 0.0 {
            report.renewable_fraction = renewable_to_load_kwh / served_kwh;
        }
        report
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ({} steps) ---", self.steps)?;
        writeln!(
            f,
            "Grid import/export:    {:.2} / {:.2} kWh",
            self.imported_kwh, self.exported_kwh
        )?;
        writeln!(f, "Net cost:              {:.4}", self.total_cost)?;
        writeln!(f, "CO2:                   {:.3} kg", self.total_co2_kg)?;
        writeln!(f, "Curtailed:             {:.2} kWh", self.curtailed_kwh)?;
        writeln!(f, "Unmet load:            {:.2} kWh", self.unmet_kwh)?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        writeln!(
            f,
            "SoC range:             {:.1}% .. {:.1}%",
            self.min_soc * 100.0,
            self.max_soc * 100.0
        )?;
        write!(f, "Renewable share:       {:.1}%", self.renewable_fraction * 100.0)
    }
}
