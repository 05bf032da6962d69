use crate::modules::types::{Module, ModuleKind, ModuleSnapshot};

/// A group of identical compute nodes drawing power from the microgrid.
///
/// The load is set from outside every tick (see [`NodeModule::update_current_load`]);
/// the module has no series of its own and never finishes.
#[derive(Debug, Clone)]
pub struct NodeModule {
    /// Node name as stored in the job table.
    pub name: String,
    /// Number of identical servers behind this name.
    pub count: u32,
    cpu_pct: f64,
    current_load_kw: f64,
}

impl NodeModule {
    /// Creates an idle node group.
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
            cpu_pct: 0.0,
            current_load_kw: 0.0,
        }
    }

    /// Sets the demand for the coming tick.
    ///
    /// Negative loads are clamped to zero: a node is a sink only.
    pub fn update_current_load(&mut self, cpu_pct: f64, load_kw: f64) {
        self.cpu_pct = cpu_pct;
        self.current_load_kw = load_kw.max(0.0);
    }

    /// Demand for the current tick (kW).
    pub fn current_load_kw(&self) -> f64 {
        self.current_load_kw
    }

    /// CPU utilisation behind the current demand (percent).
    pub fn cpu_pct(&self) -> f64 {
        self.cpu_pct
    }
}

impl Module for NodeModule {
    fn module_type(&self) -> &'static str {
        "node"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Sink
    }

    fn reset(&mut self) {
        self.cpu_pct = 0.0;
        self.current_load_kw = 0.0;
    }

    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot::of(
            self,
            &[
                ("cpu_pct", self.cpu_pct),
                ("current_load_kw", self.current_load_kw),
                ("count", self.count as f64),
            ],
        )
    }
}
