//! Dispatch loop driving every configured microgrid.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ControllerKind, RunMode, ScenarioConfig};
use crate::db::Database;
use crate::error::{DbError, Error, Result};
use crate::ingest::DataSet;
use crate::modules::build_microgrid;
use crate::power_table::PowerTable;
use crate::publisher::StatePublisher;
use crate::sim::clock::Clock;
use crate::sim::controller::{Controller, DispatchPolicy, GreedyController, RandomController};
use crate::sim::engine::Microgrid;
use crate::sim::kpi::KpiReport;
use crate::sim::types::GridsState;

/// What a finished run looked like.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Ticks executed.
    pub steps: usize,
    /// Ticks whose state could not be published.
    pub publish_failures: usize,
    /// KPI report per grid, in configuration order.
    pub reports: Vec<(String, KpiReport)>,
}

/// Owns the microgrids, the dispatch policy and every outside connection.
pub struct Runner {
    grids: Vec<Microgrid>,
    policy: DispatchPolicy,
    db: Arc<Database>,
    power_table: PowerTable,
    publisher: Box<dyn StatePublisher>,
    steps: usize,
    /// Wall-clock period between ticks; `None` runs back to back.
    pacing: Option<Duration>,
    publish_failures: usize,
}

impl Runner {
    /// Builds every microgrid of `config`.
    ///
    /// Grid `i` draws its randomness from `seed + i`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every validation failure, or a data
    /// error if a CSV input cannot be loaded or lacks a configured column.
    pub fn from_config(
        config: &ScenarioConfig,
        db: Arc<Database>,
        publisher: Box<dyn StatePublisher>,
    ) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::Config(errors));
        }

        let power_table = config
            .power_table
            .build()
            .map_err(|m| config_error("power_table.points", m))?;
        let sim = config.sim_config();
        let data = DataSet::load(&config.data)?;

        let grids = config
            .grids
            .iter()
            .enumerate()
            .map(|(i, g)| build_microgrid(g, &data, &sim, sim.seed.wrapping_add(i as u64)))
            .collect::<Result<Vec<_>, _>>()?;

        let policy = match config.simulation.controller {
            ControllerKind::Greedy => DispatchPolicy::Greedy(GreedyController),
            ControllerKind::Random => DispatchPolicy::Random(RandomController::new(sim.seed)),
        };
        let pacing = match config.simulation.mode {
            RunMode::Simulated => None,
            RunMode::Realtime => Some(
                Duration::try_from_secs_f64(config.simulation.tick_interval_secs)
                    .map_err(|e| config_error("simulation.tick_interval_secs", e.to_string()))?,
            ),
        };

        info!(
            grids = grids.len(),
            steps = sim.steps,
            controller = ?config.simulation.controller,
            mode = ?config.simulation.mode,
            "runner ready"
        );

        Ok(Self {
            grids,
            policy,
            db,
            power_table,
            publisher,
            steps: sim.steps,
            pacing,
            publish_failures: 0,
        })
    }

    /// Executes one tick for every grid and publishes the aggregated state.
    ///
    /// Publish failures are logged and counted; database failures abort.
    pub async fn tick(&mut self, step: usize) -> Result<GridsState> {
        self.refresh_node_loads()?;

        let mut states = Vec::with_capacity(self.grids.len());
        for grid in &mut self.grids {
            let outcome = grid.step(&mut self.policy);
            debug!(grid = grid.name(), "{}", outcome.record);
            self.db.record_soc(grid.name(), outcome.record.battery_soc)?;
            states.push(grid.state());
        }

        let state = GridsState {
            timestamp: Utc::now(),
            step,
            grids: states,
        };
        if let Err(e) = self.publisher.publish(&state).await {
            self.publish_failures += 1;
            warn!(step, error = %e, "failed to publish state");
        }
        Ok(state)
    }

    /// Runs until the configured step count or until any grid's series end.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut clock = match self.pacing {
            Some(period) => Clock::realtime(self.steps, period),
            None => Clock::simulated(self.steps),
        };

        while let Some(step) = clock.tick().await {
            self.tick(step).await?;
            if let Some(grid) = self.grids.iter().find(|g| g.done()) {
                info!(grid = grid.name(), step, "input series exhausted, stopping");
                break;
            }
        }

        let summary = self.summary(clock.elapsed_steps());
        info!(
            steps = summary.steps,
            publish_failures = summary.publish_failures,
            "run finished"
        );
        Ok(summary)
    }

    /// Reads each node's latest CPU load and converts it to kW.
    fn refresh_node_loads(&mut self) -> Result<(), DbError> {
        for grid in &mut self.grids {
            let mut updates = Vec::with_capacity(grid.nodes().len());
            for node in grid.nodes() {
                let cpu = match self.db.latest_load(&node.name)? {
                    Some(cpu) => cpu,
                    None => {
                        debug!(node = %node.name, "no job rows, assuming idle");
                        0.0
                    }
                };
                let kw = self.power_table.node_kw(cpu, node.count);
                updates.push((node.name.clone(), cpu, kw));
            }
            for (name, cpu, kw) in updates {
                grid.set_node_load(&name, cpu, kw);
            }
        }
        Ok(())
    }

    fn summary(&self, steps: usize) -> RunSummary {
        let reports = self
            .grids
            .iter()
            .map(|g| {
                let report = KpiReport::from_records(
                    g.log(),
                    g.config().dt_hours,
                    g.battery().max_capacity_kwh,
                );
                (g.name().to_string(), report)
            })
            .collect();
        RunSummary {
            steps,
            publish_failures: self.publish_failures,
            reports,
        }
    }

    pub fn grids(&self) -> &[Microgrid] {
        &self.grids
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}

fn config_error(field: &str, message: impl Into<String>) -> Error {
    Error::Config(vec![ConfigError::new(field, message)])
}
