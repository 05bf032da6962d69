use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::forecast::Forecaster;
use crate::modules::types::{
    Module, ModuleKind, ModuleSnapshot, TimeSeries, daylight_frac, gaussian_noise,
};

/// Outcome of drawing on renewable production for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenewableStep {
    /// Production delivered to the bus (kW).
    pub provided_kw: f64,
    /// Production left unused (kW).
    pub curtailment_kw: f64,
}

/// A renewable source (PV) driven by a production time series.
#[derive(Debug, Clone)]
pub struct RenewableModule {
    series: TimeSeries,
    forecaster: Forecaster,
    forecast_horizon: usize,
}

impl RenewableModule {
    /// Wraps a production series (kW) with an optional forecaster.
    pub fn new(series: TimeSeries, forecaster: Forecaster, forecast_horizon: usize) -> Self {
        Self {
            series,
            forecaster,
            forecast_horizon,
        }
    }

    /// Production available this tick (kW).
    pub fn current_renewable(&self) -> f64 {
        self.series.current().max(0.0)
    }

    /// Draws `used_kw` from this tick's production and curtails the rest.
    ///
    /// # Panics
    ///
    /// Panics if `used_kw` is negative or exceeds the available production
    /// by more than rounding noise.
    pub fn update(&mut self, used_kw: f64) -> RenewableStep {
        let available = self.current_renewable();
        assert!(used_kw >= -1e-9, "renewable used must be >= 0, got {used_kw}");
        assert!(
            used_kw <= available + 1e-9,
            "renewable used {used_kw} exceeds available {available}"
        );
        let provided_kw = used_kw.clamp(0.0, available);
        RenewableStep {
            provided_kw,
            curtailment_kw: available - provided_kw,
        }
    }

    /// Forecast of the next ticks using the configured forecaster.
    pub fn forecast(&mut self) -> Vec<f64> {
        self.forecaster.forecast(&self.series, self.forecast_horizon)
    }

    /// Name of the attached forecaster.
    pub fn forecaster_name(&self) -> &'static str {
        self.forecaster.name()
    }
}

impl Module for RenewableModule {
    fn module_type(&self) -> &'static str {
        "renewable"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Source
    }

    fn advance(&mut self) {
        self.series.advance();
    }

    fn reset(&mut self) {
        self.series.reset();
    }

    fn done(&self) -> bool {
        self.series.done()
    }

    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot::of(
            self,
            &[
                ("renewable_current_kw", self.current_renewable()),
                ("step", self.series.current_step() as f64),
            ],
        )
    }
}

/// Generates a synthetic PV profile: a half-sine daylight shape between
/// `sunrise_idx` and `sunset_idx` with multiplicative Gaussian noise.
///
/// # Arguments
///
/// * `kw_peak` - Output at solar noon without noise (kW)
/// * `sunrise_idx` - Tick of the day when production starts (inclusive)
/// * `sunset_idx` - Tick of the day when production stops (exclusive)
/// * `noise_std` - Relative noise, e.g. 0.05 for +/-5%
/// * `steps_per_day` - Ticks per simulated day
/// * `len` - Number of ticks to generate
/// * `seed` - Random seed for reproducible noise
///
/// # Panics
///
/// Panics if `sunrise_idx >= sunset_idx` or `sunset_idx > steps_per_day`.
pub fn synthetic_profile(
    kw_peak: f64,
    sunrise_idx: usize,
    sunset_idx: usize,
    noise_std: f64,
    steps_per_day: usize,
    len: usize,
    seed: u64,
) -> Vec<f64> {
    assert!(sunrise_idx < sunset_idx && sunset_idx <= steps_per_day);
    let kw_peak = kw_peak.max(0.0);
    let mut rng = StdRng::seed_from_u64(seed);

    (0..len)
        .map(|t| {
            let frac = daylight_frac(t, steps_per_day, sunrise_idx, sunset_idx);
            if frac <= 0.0 {
                return 0.0;
            }
            let noise_mult = 1.0 + gaussian_noise(&mut rng, noise_std.max(0.0));
            (kw_peak * frac * noise_mult).max(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(values: Vec<f64>) -> RenewableModule {
        RenewableModule::new(TimeSeries::from_values(values), Forecaster::None, 0)
    }

    #[test]
    fn update_curtails_unused_production() {
        let mut m = module(vec![5.0]);
        let step = m.update(3.0);
        assert_eq!(step.provided_kw, 3.0);
        assert_eq!(step.curtailment_kw, 2.0);
    }

    #[test]
    #[should_panic]
    fn using_more_than_available_panics() {
        module(vec![1.0]).update(2.0);
    }

    #[test]
    fn series_advances_and_finishes() {
        let mut m = module(vec![1.0, 2.0]);
        m.advance();
        assert_eq!(m.current_renewable(), 2.0);
        m.advance();
        assert!(m.done());
        m.reset();
        assert_eq!(m.current_renewable(), 1.0);
    }

    #[test]
    fn negative_values_read_as_zero() {
        assert_eq!(module(vec![-0.3]).current_renewable(), 0.0);
    }

    #[test]
    fn forecast_uses_attached_forecaster() {
        let mut m = RenewableModule::new(
            TimeSeries::from_values(vec![1.0, 2.0, 3.0]),
            Forecaster::Oracle,
            2,
        );
        assert_eq!(m.forecast(), vec![2.0, 3.0]);
        assert_eq!(m.forecaster_name(), "oracle");
    }

    #[test]
    fn synthetic_profile_is_dark_at_night() {
        let p = synthetic_profile(5.0, 6, 18, 0.05, 24, 48, 42);
        assert_eq!(p.len(), 48);
        for t in [0, 5, 18, 23, 24, 29, 42, 47] {
            assert_eq!(p[t], 0.0);
        }
        assert!(p.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn synthetic_profile_peaks_near_noon() {
        let p = synthetic_profile(5.0, 6, 18, 0.0, 24, 24, 1);
        assert!(p[12] > 4.9 && p[12] <= 5.0);
    }

    #[test]
    fn synthetic_profile_is_seeded() {
        let a = synthetic_profile(5.0, 6, 18, 0.1, 24, 24, 42);
        let b = synthetic_profile(5.0, 6, 18, 0.1, 24, 24, 42);
        let c = synthetic_profile(5.0, 6, 18, 0.1, 24, 24, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    #[should_panic]
    fn synthetic_profile_rejects_inverted_daylight() {
        synthetic_profile(5.0, 18, 6, 0.0, 24, 24, 0);
    }
}
