//! Common types and traits for microgrid modules.

use std::collections::BTreeMap;

use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// A value that changes every tick, or a static value that never changes.
///
/// The cursor starts at step 0 and moves forward with [`TimeSeries::advance`].
/// A finite series is done once the cursor has moved past its last value.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    values: Vec<f64>,
    constant: Option<f64>,
    step: usize,
}

impl TimeSeries {
    /// Wraps a finite series.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            constant: None,
            step: 0,
        }
    }

    /// A static value that is never exhausted.
    pub fn constant(value: f64) -> Self {
        Self {
            values: Vec::new(),
            constant: Some(value),
            step: 0,
        }
    }

    /// Value at the cursor. Past the end, the last value is held.
    pub fn current(&self) -> f64 {
        if let Some(v) = self.constant {
            return v;
        }
        self.values
            .get(self.step)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Value `offset` ticks ahead of the cursor, if the series reaches that far.
    pub fn ahead(&self, offset: usize) -> Option<f64> {
        match self.constant {
            Some(v) => Some(v),
            None => self.values.get(self.step + offset).copied(),
        }
    }

    /// Moves the cursor one tick forward.
    pub fn advance(&mut self) {
        self.step += 1;
    }

    /// Rewinds the cursor to the first value.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Current cursor position.
    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Number of values, or `None` for a static value.
    pub fn len(&self) -> Option<usize> {
        self.constant.map_or(Some(self.values.len()), |_| None)
    }

    /// Returns `true` for a finite series with no values.
    pub fn is_empty(&self) -> bool {
        self.constant.is_none() && self.values.is_empty()
    }

    /// Returns `true` once a finite series has no value left at the cursor.
    pub fn done(&self) -> bool {
        self.constant.is_none() && self.step >= self.values.len()
    }
}

/// Role a module plays in the power balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Stores and releases energy (battery).
    Storage,
    /// Produces energy (renewables).
    Source,
    /// Consumes energy (compute nodes, base load).
    Sink,
    /// Both imports and exports (grid tie).
    Exchange,
}

/// Serializable point-in-time view of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub module_type: String,
    pub kind: ModuleKind,
    /// Named state values, e.g. `"soc"` or `"current_load_kw"`.
    pub values: BTreeMap<String, f64>,
}

impl ModuleSnapshot {
    /// Snapshot of `module` with the given named values.
    pub fn of<M: Module + ?Sized>(module: &M, values: &[(&str, f64)]) -> Self {
        Self {
            module_type: module.module_type().to_string(),
            kind: module.kind(),
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// Behaviour shared by every microgrid module.
///
/// Power values follow one convention across modules: kW averaged over the
/// tick, converted to energy with `dt_hours`.
pub trait Module {
    /// Human-readable module type name.
    fn module_type(&self) -> &'static str;

    /// Role of the module in the power balance.
    fn kind(&self) -> ModuleKind;

    /// Moves any wrapped time series to the next tick.
    fn advance(&mut self) {}

    /// Restores the initial state.
    fn reset(&mut self);

    /// Returns `true` once a wrapped time series is exhausted.
    fn done(&self) -> bool {
        false
    }

    /// Current state for logs and the HTTP API.
    fn snapshot(&self) -> ModuleSnapshot;
}

/// Gaussian noise via the Box-Muller transform.
///
/// Returns a sample with mean 0 and the given standard deviation; zero when
/// `std_dev <= 0`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Half-sine daylight fraction for tick `t`.
///
/// Zero outside `[sunrise_idx, sunset_idx)`, peaking at 1.0 at solar noon.
pub fn daylight_frac(t: usize, steps_per_day: usize, sunrise_idx: usize, sunset_idx: usize) -> f64 {
    let tod = t % steps_per_day.max(1);
    if tod < sunrise_idx || tod >= sunset_idx {
        return 0.0;
    }
    let span = (sunset_idx - sunrise_idx) as f64;
    let x = (tod - sunrise_idx) as f64 / span;
    (std::f64::consts::PI * x).sin().max(0.0)
}
