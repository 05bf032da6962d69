//! Builds the modules of one microgrid from its configuration and CSV data.

use tracing::debug;

use crate::config::{ForecasterKind, GridConfig, PvSource};
use crate::error::DataError;
use crate::forecast::Forecaster;
use crate::ingest::{DataSet, SeriesTable};
use crate::sim::engine::Microgrid;
use crate::sim::types::SimConfig;

use super::battery::BatteryModule;
use super::grid::GridModule;
use super::load::LoadModule;
use super::node::NodeModule;
use super::renewable::{RenewableModule, synthetic_profile};
use super::types::TimeSeries;

/// Wires battery, renewable, grid, node and load modules for one grid.
///
/// # Arguments
///
/// * `grid` - Validated grid configuration
/// * `data` - CSV inputs loaded at startup
/// * `config` - Simulation timing
/// * `seed` - Seed for this grid's synthetic PV noise and forecaster
///
/// # Errors
///
/// Returns `DataError::Grid` naming the grid if its PV column is missing or
/// the PV source needs a solar CSV that was not loaded.
///
/// # Panics
///
/// Panics on battery or PV parameters that [`crate::config::ScenarioConfig::validate`]
/// rejects.
pub fn build_microgrid(
    grid: &GridConfig,
    data: &DataSet,
    config: &SimConfig,
    seed: u64,
) -> Result<Microgrid, DataError> {
    let b = &grid.battery;
    let battery = BatteryModule::new(
        b.min_capacity_kwh,
        b.max_capacity_kwh,
        b.max_charge_kw,
        b.max_discharge_kw,
        b.efficiency,
        b.init_soc,
        config,
    );

    let renewable = RenewableModule::new(
        pv_series(grid, data, config, seed)?,
        forecaster(grid, seed),
        grid.pv.forecast_horizon,
    );

    let g = &grid.grid;
    let (import_price, export_price) = match &data.price {
        Some(table) => (
            TimeSeries::from_values(table.column("import_price")?.to_vec()),
            TimeSeries::from_values(table.column("export_price")?.to_vec()),
        ),
        None => (
            TimeSeries::constant(g.import_price),
            TimeSeries::constant(g.export_price),
        ),
    };
    let co2 = match &data.carbon {
        Some(table) => TimeSeries::from_values(table.column("co2_per_kwh")?.to_vec()),
        None => TimeSeries::constant(g.co2_per_kwh),
    };
    let grid_tie = GridModule::new(
        g.max_import_kw,
        g.max_export_kw,
        import_price,
        export_price,
        co2,
        config,
    );

    let nodes = grid
        .nodes
        .iter()
        .map(|n| NodeModule::new(n.name.clone(), n.count))
        .collect();
    let load = grid
        .load
        .as_ref()
        .map(|l| LoadModule::new(TimeSeries::constant(l.kw)));

    debug!(grid = %grid.name, nodes = grid.nodes.len(), "built microgrid");
    Ok(Microgrid::new(
        grid.name.clone(),
        config.clone(),
        battery,
        renewable,
        grid_tie,
        nodes,
        load,
    ))
}

fn pv_series(
    grid: &GridConfig,
    data: &DataSet,
    config: &SimConfig,
    seed: u64,
) -> Result<TimeSeries, DataError> {
    let pv = &grid.pv;
    match pv.source {
        PvSource::Csv => {
            let table: &SeriesTable = data.solar.as_ref().ok_or_else(|| DataError::Grid {
                grid: grid.name.clone(),
                message: "pv source is \"csv\" but no solar CSV was loaded".into(),
            })?;
            let values = table.column(grid.pv_column()).map_err(|e| DataError::Grid {
                grid: grid.name.clone(),
                message: e.to_string(),
            })?;
            Ok(TimeSeries::from_values(
                values.iter().map(|v| v * pv.scale).collect(),
            ))
        }
        PvSource::Synthetic => Ok(TimeSeries::from_values(synthetic_profile(
            pv.kw_peak,
            pv.sunrise_idx,
            pv.sunset_idx,
            pv.noise_std,
            config.steps_per_day,
            config.total_steps(),
            seed,
        ))),
    }
}

fn forecaster(grid: &GridConfig, seed: u64) -> Forecaster {
    match grid.pv.forecaster {
        ForecasterKind::None => Forecaster::None,
        ForecasterKind::Oracle => Forecaster::Oracle,
        ForecasterKind::Persistence => Forecaster::Persistence,
        ForecasterKind::Gaussian => Forecaster::gaussian(
            grid.pv.forecast_std_kw,
            grid.pv.increase_uncertainty,
            seed.wrapping_add(1),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridConfig, LoadConfig};
    use crate::sim::controller::GreedyController;

    fn solar() -> SeriesTable {
        SeriesTable::from_reader(
            "timestamp,ES10,pv_south\nt0,1.0,4.0\nt1,2.0,5.0\n".as_bytes(),
            "solar.csv",
        )
        .unwrap()
    }

    #[test]
    fn synthetic_grid_runs_for_configured_steps() {
        let cfg = SimConfig::new(96, 30, 0);
        let mut mg =
            build_microgrid(&GridConfig::named("ES10", 2), &DataSet::default(), &cfg, 5).unwrap();
        assert_eq!(mg.name(), "ES10");
        assert_eq!(mg.nodes().len(), 1);
        assert_eq!(mg.run(&mut GreedyController).len(), 30);
    }

    #[test]
    fn csv_column_is_scaled() {
        let cfg = SimConfig::new(24, 2, 0);
        let mut grid = GridConfig::named("PT02", 1);
        grid.pv.source = PvSource::Csv;
        grid.pv.column = Some("pv_south".into());
        grid.pv.scale = 0.5;
        let data = DataSet {
            solar: Some(solar()),
            ..DataSet::default()
        };
        let mut mg = build_microgrid(&grid, &data, &cfg, 0).unwrap();
        let r = mg.step(&mut GreedyController).record;
        assert_eq!(r.renewable_kw, 2.0);
    }

    #[test]
    fn unknown_column_names_the_grid() {
        let cfg = SimConfig::new(24, 2, 0);
        let mut grid = GridConfig::named("ES12", 1);
        grid.pv.source = PvSource::Csv;
        let data = DataSet {
            solar: Some(solar()),
            ..DataSet::default()
        };
        let err = build_microgrid(&grid, &data, &cfg, 0).unwrap_err();
        assert!(matches!(err, DataError::Grid { ref grid, .. } if grid == "ES12"));
        assert!(err.to_string().contains("ES12"));
    }

    #[test]
    fn csv_source_without_data_is_an_error() {
        let cfg = SimConfig::new(24, 2, 0);
        let mut grid = GridConfig::named("ES10", 1);
        grid.pv.source = PvSource::Csv;
        assert!(build_microgrid(&grid, &DataSet::default(), &cfg, 0).is_err());
    }

    #[test]
    fn carbon_series_drives_emissions() {
        let cfg = SimConfig::new(96, 2, 0);
        let mut grid = GridConfig::named("ES10", 1);
        grid.pv.kw_peak = 0.0;
        grid.battery.init_soc = 0.0;
        grid.load = Some(LoadConfig { kw: 1.0 });
        let data = DataSet {
            carbon: Some(
                SeriesTable::from_reader("timestamp,co2_per_kwh\nt0,0.5\nt1,0.1\n".as_bytes(), "c")
                    .unwrap(),
            ),
            ..DataSet::default()
        };
        let mut mg = build_microgrid(&grid, &data, &cfg, 0).unwrap();
        let r = mg.step(&mut GreedyController).record;
        assert_eq!(r.grid_import_kw, 1.0);
        // 1 kW for 15 min at 0.5 kg/kWh
        assert!((r.co2_kg - 0.125).abs() < 1e-12);
    }
}
