//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use microgrid_sim::config::ScenarioConfig;
use microgrid_sim::db::Database;
use microgrid_sim::error::PublishError;
use microgrid_sim::publisher::StatePublisher;
use microgrid_sim::sim::types::{Dispatch, GridsState, StepRecord};

/// In-memory database with the three demo job rows.
pub fn demo_db() -> Arc<Database> {
    let db = Database::open_in_memory().expect("in-memory database");
    db.seed_demo().expect("seed demo rows");
    Arc::new(db)
}

/// Demo preset shortened to `steps` ticks of 15 minutes.
pub fn short_demo(steps: usize) -> ScenarioConfig {
    let mut config = ScenarioConfig::demo();
    config.simulation.steps = steps;
    config
}

/// Keeps every published state; optionally fails every publish instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    pub states: Arc<Mutex<Vec<GridsState>>>,
    pub fail: bool,
}

impl MemoryPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<GridsState> {
        self.states.lock().expect("publisher lock").clone()
    }
}

#[async_trait]
impl StatePublisher for MemoryPublisher {
    async fn publish(&self, state: &GridsState) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.states.lock().expect("publisher lock").push(state.clone());
        Ok(())
    }
}

/// Settled dispatch of a recorded tick, for balance checks.
pub fn settled(r: &StepRecord) -> Dispatch {
    Dispatch {
        battery_kw: r.battery_kw,
        import_kw: r.grid_import_kw,
        export_kw: r.grid_export_kw,
        curtailment_kw: r.curtailment_kw,
        loss_load_kw: r.loss_load_kw,
    }
}

/// Writes `contents` to `name` inside `dir`.
pub fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create fixture");
    f.write_all(contents.as_bytes()).expect("write fixture");
    path
}
