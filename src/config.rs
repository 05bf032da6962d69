//! TOML-based scenario configuration and preset definitions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::power_table::PowerTable;
use crate::sim::types::SimConfig;

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or start from a preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing, controller and pacing.
    pub simulation: SimulationConfig,
    /// Optional CSV inputs.
    pub data: DataConfig,
    /// SQLite location.
    pub database: DatabaseConfig,
    /// HTTP service and state posting.
    pub api: ApiConfig,
    /// CPU-to-watts lookup table override.
    pub power_table: PowerTableConfig,
    /// One entry per microgrid.
    pub grids: Vec<GridConfig>,
}

/// Dispatch policy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    #[default]
    Greedy,
    Random,
}

/// Tick pacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Ticks run back to back.
    #[default]
    Simulated,
    /// One tick every `tick_interval_secs` of wall-clock time.
    Realtime,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of ticks to run (must be > 0).
    pub steps: usize,
    /// Number of ticks per simulated day (must be > 0).
    pub steps_per_day: usize,
    /// Master random seed.
    pub seed: u64,
    pub controller: ControllerKind,
    pub mode: RunMode,
    /// Wall-clock seconds between ticks in realtime mode.
    pub tick_interval_secs: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 96,
            steps_per_day: 96,
            seed: 42,
            controller: ControllerKind::Greedy,
            mode: RunMode::Simulated,
            tick_interval_secs: 15.0,
        }
    }
}

/// Optional CSV inputs, read once at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// `timestamp` plus one kW column per series.
    pub solar_csv: Option<PathBuf>,
    /// `timestamp,co2_per_kwh`.
    pub carbon_csv: Option<PathBuf>,
    /// `timestamp,import_price,export_price`.
    pub price_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Insert the demo job rows when the job table is empty.
    pub seed_on_init: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database.db"),
            seed_on_init: true,
        }
    }
}

/// HTTP service and state posting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
    /// Endpoint receiving `{"data": state}` after every tick. Empty (the
    /// default) disables posting unless `run --serve` points it at the local
    /// `/insert` route.
    pub post_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Extra attempts after a failed post.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            post_url: String::new(),
            timeout_secs: 10,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl ApiConfig {
    /// `bind_address:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// URL of the `/insert` route served from this section's address.
    /// A wildcard bind address is reached through the loopback interface.
    pub fn local_insert_url(&self) -> String {
        let host = match self.bind_address.as_str() {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" => "[::1]",
            other => other,
        };
        format!("http://{host}:{}/insert", self.port)
    }
}

/// CPU-to-watts lookup table override.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerTableConfig {
    /// `[[cpu_pct, watts], ...]`, strictly increasing in CPU.
    pub points: Option<Vec<[f64; 2]>>,
}

impl PowerTableConfig {
    /// Builds the configured table, or the default one.
    pub fn build(&self) -> Result<PowerTable, String> {
        match &self.points {
            Some(points) => PowerTable::new(points.iter().map(|[c, w]| (*c, *w)).collect()),
            None => Ok(PowerTable::default()),
        }
    }
}

/// One microgrid.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Grid name, e.g. `"ES10"`.
    pub name: String,
    pub battery: BatteryConfig,
    pub pv: PvConfig,
    pub grid: GridTieConfig,
    /// Compute-node groups whose load is read from the job table.
    pub nodes: Vec<NodeConfig>,
    /// Static base load on top of the nodes.
    pub load: Option<LoadConfig>,
}

/// Battery storage parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    pub min_capacity_kwh: f64,
    pub max_capacity_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    /// Charge and discharge efficiency (0.0-1.0].
    pub efficiency: f64,
    /// Initial state of charge (0.0-1.0).
    pub init_soc: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            min_capacity_kwh: 0.0,
            max_capacity_kwh: 5.0,
            max_charge_kw: 2.0,
            max_discharge_kw: 2.0,
            efficiency: 0.95,
            init_soc: 0.5,
        }
    }
}

/// Where PV production comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PvSource {
    /// A column of `data.solar_csv`.
    Csv,
    /// Half-sine daylight profile with noise.
    #[default]
    Synthetic,
}

/// Forecaster attached to the PV module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecasterKind {
    #[default]
    None,
    Oracle,
    Persistence,
    Gaussian,
}

/// Solar PV parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvConfig {
    pub source: PvSource,
    /// CSV column; defaults to the grid name.
    pub column: Option<String>,
    /// Multiplier applied to CSV values.
    pub scale: f64,
    /// Synthetic peak output (kW).
    pub kw_peak: f64,
    /// Synthetic sunrise tick of the day (inclusive).
    pub sunrise_idx: usize,
    /// Synthetic sunset tick of the day (exclusive).
    pub sunset_idx: usize,
    /// Synthetic relative noise.
    pub noise_std: f64,
    pub forecaster: ForecasterKind,
    /// Ticks covered by the forecast.
    pub forecast_horizon: usize,
    /// Gaussian forecaster noise (kW).
    pub forecast_std_kw: f64,
    /// Widen Gaussian forecast noise with the horizon.
    pub increase_uncertainty: bool,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self {
            source: PvSource::Synthetic,
            column: None,
            scale: 1.0,
            kw_peak: 1.5,
            sunrise_idx: 24,
            sunset_idx: 76,
            noise_std: 0.05,
            forecaster: ForecasterKind::None,
            forecast_horizon: 4,
            forecast_std_kw: 0.1,
            increase_uncertainty: false,
        }
    }
}

/// Grid tie parameters; static tariffs and intensity apply when no CSV is configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridTieConfig {
    pub max_import_kw: f64,
    pub max_export_kw: f64,
    pub import_price: f64,
    pub export_price: f64,
    pub co2_per_kwh: f64,
}

impl Default for GridTieConfig {
    fn default() -> Self {
        Self {
            max_import_kw: 5.0,
            max_export_kw: 2.0,
            import_price: 0.30,
            export_price: 0.08,
            co2_per_kwh: 0.25,
        }
    }
}

/// A group of identical servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Name looked up in the job table.
    pub name: String,
    /// Number of servers.
    pub count: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Static base load (kW).
    pub kw: f64,
}

/// Longest accepted wall-clock pause between realtime ticks (one day).
pub const MAX_TICK_INTERVAL_SECS: f64 = 86_400.0;

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.steps_per_day"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl GridConfig {
    /// A grid with default modules and one node group named after the grid.
    pub fn named(name: &str, node_count: u32) -> Self {
        Self {
            name: name.to_string(),
            nodes: vec![NodeConfig {
                name: name.to_string(),
                count: node_count,
            }],
            ..Self::default()
        }
    }

    /// CSV column holding this grid's PV production.
    pub fn pv_column(&self) -> &str {
        self.pv.column.as_deref().unwrap_or(&self.name)
    }

    /// Every numeric parameter with its path below `grids[i]`.
    fn float_fields(&self) -> Vec<(&'static str, f64)> {
        let (b, pv, gt) = (&self.battery, &self.pv, &self.grid);
        let mut fields = vec![
            ("battery.min_capacity_kwh", b.min_capacity_kwh),
            ("battery.max_capacity_kwh", b.max_capacity_kwh),
            ("battery.max_charge_kw", b.max_charge_kw),
            ("battery.max_discharge_kw", b.max_discharge_kw),
            ("battery.efficiency", b.efficiency),
            ("battery.init_soc", b.init_soc),
            ("pv.scale", pv.scale),
            ("pv.kw_peak", pv.kw_peak),
            ("pv.noise_std", pv.noise_std),
            ("pv.forecast_std_kw", pv.forecast_std_kw),
            ("grid.max_import_kw", gt.max_import_kw),
            ("grid.max_export_kw", gt.max_export_kw),
            ("grid.import_price", gt.import_price),
            ("grid.export_price", gt.export_price),
            ("grid.co2_per_kwh", gt.co2_per_kwh),
        ];
        if let Some(load) = &self.load {
            fields.push(("load.kw", load.kw));
        }
        fields
    }
}

impl ScenarioConfig {
    /// Three grids matching the seeded job rows (ES10, PT02, ES12).
    pub fn demo() -> Self {
        let mut pt02 = GridConfig::named("PT02", 2);
        pt02.pv.kw_peak = 2.5;
        pt02.battery.init_soc = 0.3;

        let mut es12 = GridConfig::named("ES12", 6);
        es12.battery.max_capacity_kwh = 8.0;
        es12.battery.max_charge_kw = 3.0;
        es12.battery.max_discharge_kw = 3.0;
        es12.load = Some(LoadConfig { kw: 0.2 });

        Self {
            grids: vec![GridConfig::named("ES10", 4), pt02, es12],
            ..Self::default()
        }
    }

    /// One grid with a single node group.
    pub fn single() -> Self {
        Self {
            grids: vec![GridConfig::named("ES10", 4)],
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo", "single"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo" => Ok(Self::demo()),
            "single" => Ok(Self::single()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Timing configuration for the engine.
    ///
    /// # Panics
    ///
    /// Panics if `steps` or `steps_per_day` is zero; call [`Self::validate`] first.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(
            self.simulation.steps_per_day,
            self.simulation.steps,
            self.simulation.seed,
        )
    }

    /// Validates all fields and returns every violation found.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.steps == 0 {
            errors.push(ConfigError::new("simulation.steps", "must be > 0"));
        }
        if s.steps_per_day == 0 {
            errors.push(ConfigError::new("simulation.steps_per_day", "must be > 0"));
        }
        if !(s.tick_interval_secs.is_finite()
            && s.tick_interval_secs > 0.0
            && s.tick_interval_secs <= MAX_TICK_INTERVAL_SECS)
        {
            errors.push(ConfigError::new(
                "simulation.tick_interval_secs",
                format!("must be in (0, {MAX_TICK_INTERVAL_SECS}]"),
            ));
        }

        if self.api.timeout_secs == 0 {
            errors.push(ConfigError::new("api.timeout_secs", "must be > 0"));
        }
        if !self.api.post_url.is_empty()
            && !(self.api.post_url.starts_with("http://")
                || self.api.post_url.starts_with("https://"))
        {
            errors.push(ConfigError::new(
                "api.post_url",
                format!("must be an http(s) URL, got \"{}\"", self.api.post_url),
            ));
        }

        if let Err(message) = self.power_table.build() {
            errors.push(ConfigError::new("power_table.points", message));
        }

        if self.grids.is_empty() {
            errors.push(ConfigError::new("grids", "at least one grid is required"));
        }

        let mut names = HashSet::new();
        for (i, g) in self.grids.iter().enumerate() {
            let at = |field: &str| format!("grids[{i}].{field}");

            for (field, value) in g.float_fields() {
                if !value.is_finite() {
                    errors.push(ConfigError::new(at(field), "must be a finite number"));
                }
            }

            if g.name.trim().is_empty() {
                errors.push(ConfigError::new(at("name"), "must not be empty"));
            } else if !names.insert(g.name.as_str()) {
                errors.push(ConfigError::new(
                    at("name"),
                    format!("duplicate grid name \"{}\"", g.name),
                ));
            }

            let b = &g.battery;
            if b.max_capacity_kwh <= 0.0 {
                errors.push(ConfigError::new(at("battery.max_capacity_kwh"), "must be > 0"));
            }
            if b.min_capacity_kwh < 0.0 || b.min_capacity_kwh > b.max_capacity_kwh {
                errors.push(ConfigError::new(
                    at("battery.min_capacity_kwh"),
                    "must be in [0, battery.max_capacity_kwh]",
                ));
            }
            if b.max_charge_kw < 0.0 {
                errors.push(ConfigError::new(at("battery.max_charge_kw"), "must be >= 0"));
            }
            if b.max_discharge_kw < 0.0 {
                errors.push(ConfigError::new(at("battery.max_discharge_kw"), "must be >= 0"));
            }
            if !(b.efficiency > 0.0 && b.efficiency <= 1.0) {
                errors.push(ConfigError::new(at("battery.efficiency"), "must be in (0.0, 1.0]"));
            }
            if !(0.0..=1.0).contains(&b.init_soc) {
                errors.push(ConfigError::new(at("battery.init_soc"), "must be in [0.0, 1.0]"));
            } else if b.init_soc * b.max_capacity_kwh < b.min_capacity_kwh {
                errors.push(ConfigError::new(
                    at("battery.init_soc"),
                    "initial charge must be >= battery.min_capacity_kwh",
                ));
            }

            let pv = &g.pv;
            match pv.source {
                PvSource::Csv => {
                    if self.data.solar_csv.is_none() {
                        errors.push(ConfigError::new(
                            at("pv.source"),
                            "\"csv\" requires data.solar_csv",
                        ));
                    }
                    if pv.scale < 0.0 {
                        errors.push(ConfigError::new(at("pv.scale"), "must be >= 0"));
                    }
                }
                PvSource::Synthetic => {
                    if pv.kw_peak < 0.0 {
                        errors.push(ConfigError::new(at("pv.kw_peak"), "must be >= 0"));
                    }
                    if pv.sunrise_idx >= pv.sunset_idx {
                        errors.push(ConfigError::new(
                            at("pv.sunrise_idx"),
                            "must be < pv.sunset_idx",
                        ));
                    }
                    if s.steps_per_day > 0 && pv.sunset_idx > s.steps_per_day {
                        errors.push(ConfigError::new(
                            at("pv.sunset_idx"),
                            "must be <= simulation.steps_per_day",
                        ));
                    }
                }
            }
            if pv.noise_std < 0.0 {
                errors.push(ConfigError::new(at("pv.noise_std"), "must be >= 0"));
            }
            if pv.forecast_std_kw < 0.0 {
                errors.push(ConfigError::new(at("pv.forecast_std_kw"), "must be >= 0"));
            }

            let gt = &g.grid;
            if gt.max_import_kw < 0.0 {
                errors.push(ConfigError::new(at("grid.max_import_kw"), "must be >= 0"));
            }
            if gt.max_export_kw < 0.0 {
                errors.push(ConfigError::new(at("grid.max_export_kw"), "must be >= 0"));
            }

            for (j, n) in g.nodes.iter().enumerate() {
                if n.name.trim().is_empty() {
                    errors.push(ConfigError::new(at(&format!("nodes[{j}].name")), "must not be empty"));
                }
                if n.count == 0 {
                    errors.push(ConfigError::new(at(&format!("nodes[{j}].count")), "must be > 0"));
                }
            }

            if g.load.as_ref().is_some_and(|l| l.kw < 0.0) {
                errors.push(ConfigError::new(at("load.kw"), "must be >= 0"));
            }
        }

        errors
    }
}
