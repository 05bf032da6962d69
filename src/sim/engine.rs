//! Microgrid stepping: modules, controller and power balance for one grid.

use tracing::{debug, warn};

use crate::modules::{BatteryModule, GridModule, LoadModule, Module, NodeModule, RenewableModule};
use crate::sim::types::NodeLoad;

use super::controller::{Controller, settle_on_grid};
use super::power_balance::{balance_residual_kw, net_load_kw};
use super::types::{Dispatch, GridState, SimConfig, StepInput, StepLimits, StepRecord};

/// Result of one [`Microgrid::step`].
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub record: StepRecord,
    /// `true` once any wrapped series is exhausted.
    pub done: bool,
}

/// One microgrid: battery, renewable source, grid tie, compute nodes and an
/// optional base load.
///
/// Holds typed module fields rather than trait objects since the module set
/// is fixed. The controller is passed in per step so several grids can share
/// one policy.
#[derive(Debug, Clone)]
pub struct Microgrid {
    name: String,
    config: SimConfig,
    battery: BatteryModule,
    renewable: RenewableModule,
    grid: GridModule,
    nodes: Vec<NodeModule>,
    load: Option<LoadModule>,
    timestep: usize,
    log: Vec<StepRecord>,
}

impl Microgrid {
    /// Assembles a microgrid from its modules.
    ///
    /// # Arguments
    ///
    /// * `name` - Grid name (e.g. `"ES10"`)
    /// * `config` - Simulation timing
    /// * `battery` - Storage module
    /// * `renewable` - PV module
    /// * `grid` - Grid tie
    /// * `nodes` - Compute-node groups, loads set externally each tick
    /// * `load` - Optional base load
    pub fn new(
        name: impl Into<String>,
        config: SimConfig,
        battery: BatteryModule,
        renewable: RenewableModule,
        grid: GridModule,
        nodes: Vec<NodeModule>,
        load: Option<LoadModule>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            battery,
            renewable,
            grid,
            nodes,
            load,
            timestep: 0,
            log: Vec::new(),
        }
    }

    /// Sets the current load of the named node group.
    ///
    /// Returns `false` if no node has that name.
    pub fn set_node_load(&mut self, node: &str, cpu_pct: f64, load_kw: f64) -> bool {
        match self.nodes.iter_mut().find(|n| n.name == node) {
            Some(n) => {
                n.update_current_load(cpu_pct, load_kw);
                true
            }
            None => false,
        }
    }

    /// Executes one tick with `controller` and appends the record to the log.
    ///
    /// A setpoint outside the battery's limits is clipped and the grid is
    /// re-settled around the clipped power before the battery is touched, so
    /// the recorded tick always balances.
    pub fn step<C: Controller + ?Sized>(&mut self, controller: &mut C) -> StepOutcome {
        let t = self.timestep;

        // 1. Read demand and production
        let node_load_kw: f64 = self.nodes.iter().map(NodeModule::current_load_kw).sum();
        let base_load_kw = self.load.as_ref().map_or(0.0, LoadModule::current_load_kw);
        let load_kw = node_load_kw + base_load_kw;
        let renewable_kw = self.renewable.current_renewable();

        // 2. Controller inputs
        let input = StepInput {
            timestep: t,
            load_kw,
            renewable_kw,
            battery_soc: self.battery.soc(),
        };
        let limits = StepLimits {
            max_charge_kw: self.battery.max_consumption_kw(),
            max_discharge_kw: self.battery.max_production_kw(),
            max_import_kw: self.grid.max_import_kw,
            max_export_kw: self.grid.max_export_kw,
        };

        // 3. Dispatch
        let mut dispatch = controller.dispatch(&input, &limits);

        // 4. Clip to the battery's limits and re-settle before applying
        let clipped_kw = dispatch
            .battery_kw
            .clamp(-limits.max_discharge_kw, limits.max_charge_kw);
        if (clipped_kw - dispatch.battery_kw).abs() > 1e-9 {
            debug!(
                grid = %self.name,
                requested = dispatch.battery_kw,
                clipped = clipped_kw,
                "battery clipped setpoint"
            );
            // settle_on_grid may shrink the discharge further; keep its value
            dispatch = settle_on_grid(
                net_load_kw(load_kw, renewable_kw),
                clipped_kw,
                renewable_kw,
                &limits,
            );
        }
        let battery_kw = self.battery.apply_setpoint(dispatch.battery_kw);

        // 5. Grid exchange; anything the grid refuses becomes loss or curtailment
        let grid_step = self.grid.update(dispatch.import_kw, dispatch.export_kw);
        let loss_load_kw = dispatch.loss_load_kw + (dispatch.import_kw - grid_step.import_kw);
        let curtailment_kw = (dispatch.curtailment_kw + (dispatch.export_kw - grid_step.export_kw))
            .clamp(0.0, renewable_kw);
        let renewable_step = self.renewable.update(renewable_kw - curtailment_kw);

        let settled = Dispatch {
            battery_kw,
            import_kw: grid_step.import_kw,
            export_kw: grid_step.export_kw,
            curtailment_kw: renewable_step.curtailment_kw,
            loss_load_kw,
        };
        let residual = balance_residual_kw(load_kw, renewable_kw, &settled);
        if residual.abs() > 1e-6 {
            warn!(grid = %self.name, t, residual, "power balance residual");
        }

        let record = StepRecord {
            timestep: t,
            time_hr: t as f64 * self.config.dt_hours,
            load_kw,
            node_load_kw,
            renewable_kw,
            renewable_used_kw: renewable_step.provided_kw,
            curtailment_kw: renewable_step.curtailment_kw,
            battery_kw,
            battery_soc: self.battery.soc(),
            battery_charge_kwh: self.battery.current_charge_kwh(),
            grid_import_kw: grid_step.import_kw,
            grid_export_kw: grid_step.export_kw,
            loss_load_kw,
            cost: grid_step.cost,
            co2_kg: grid_step.co2_kg,
            reward: -grid_step.cost,
        };

        // 6. Advance every series
        self.renewable.advance();
        self.grid.advance();
        if let Some(load) = self.load.as_mut() {
            load.advance();
        }
        for node in &mut self.nodes {
            node.advance();
        }
        self.timestep += 1;
        self.log.push(record.clone());

        StepOutcome {
            record,
            done: self.done(),
        }
    }

    /// Runs until `config.steps` ticks have been taken or a series runs out.
    pub fn run<C: Controller + ?Sized>(&mut self, controller: &mut C) -> &[StepRecord] {
        while self.timestep < self.config.total_steps() && !self.done() {
            self.step(controller);
        }
        &self.log
    }

    /// Restores initial charge, rewinds every series and clears the log.
    pub fn reset(&mut self) {
        self.battery.reset();
        self.renewable.reset();
        self.grid.reset();
        if let Some(load) = self.load.as_mut() {
            load.reset();
        }
        for node in &mut self.nodes {
            node.reset();
        }
        self.timestep = 0;
        self.log.clear();
    }

    /// `true` once any wrapped series is exhausted.
    pub fn done(&self) -> bool {
        self.renewable.done() || self.grid.done() || self.load.as_ref().is_some_and(|l| l.done())
    }

    /// Current state for publishing. Draws a fresh renewable forecast.
    pub fn state(&mut self) -> GridState {
        let mut modules = vec![
            self.battery.snapshot(),
            self.renewable.snapshot(),
            self.grid.snapshot(),
        ];
        modules.extend(self.nodes.iter().map(|n| n.snapshot()));
        if let Some(load) = &self.load {
            modules.push(load.snapshot());
        }

        GridState {
            name: self.name.clone(),
            soc: self.battery.soc(),
            current_charge_kwh: self.battery.current_charge_kwh(),
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeLoad {
                    name: n.name.clone(),
                    cpu_pct: n.cpu_pct(),
                    load_kw: n.current_load_kw(),
                })
                .collect(),
            renewable_forecast_kw: self.renewable.forecast(),
            last_step: self.log.last().cloned(),
            modules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Every record since the last reset.
    pub fn log(&self) -> &[StepRecord] {
        &self.log
    }

    pub fn battery(&self) -> &BatteryModule {
        &self.battery
    }

    pub fn nodes(&self) -> &[NodeModule] {
        &self.nodes
    }

    /// Index of the next tick.
    pub fn timestep(&self) -> usize {
        self.timestep
    }
}
