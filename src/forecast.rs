//! Forecasting utilities for renewable production.

use rand::{SeedableRng, rngs::StdRng};

use crate::modules::types::{TimeSeries, gaussian_noise};

/// Forecaster attached to a time-series module.
///
/// Every forecast covers the ticks after the cursor, is truncated at the end
/// of a finite series, and never goes negative.
#[derive(Debug, Clone)]
pub enum Forecaster {
    /// No forecast; always returns an empty vector.
    None,
    /// Perfect foresight: the true future values.
    Oracle,
    /// "Tomorrow is today": repeats the current value over the horizon.
    Persistence,
    /// True future values plus zero-mean Gaussian noise (kW).
    GaussianNoise {
        std_kw: f64,
        /// Widens the noise with the distance from the cursor.
        increase_uncertainty: bool,
        rng: StdRng,
    },
}

impl Forecaster {
    /// Builds a seeded Gaussian-noise forecaster.
    pub fn gaussian(std_kw: f64, increase_uncertainty: bool, seed: u64) -> Self {
        Self::GaussianNoise {
            std_kw: std_kw.max(0.0),
            increase_uncertainty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Short name for logs and state snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Oracle => "oracle",
            Self::Persistence => "persistence",
            Self::GaussianNoise { .. } => "gaussian",
        }
    }

    /// Forecasts up to `horizon` ticks after the cursor of `series`.
    ///
    /// # Arguments
    ///
    /// * `series` - The series being forecast; only values ahead of the cursor are read
    /// * `horizon` - Number of ticks to forecast
    pub fn forecast(&mut self, series: &TimeSeries, horizon: usize) -> Vec<f64> {
        let truth = || (1..=horizon).map_while(|k| series.ahead(k));

        match self {
            Self::None => Vec::new(),
            Self::Oracle => truth().map(|v| v.max(0.0)).collect(),
            Self::Persistence => {
                let current = series.current().max(0.0);
                truth().map(|_| current).collect()
            }
            Self::GaussianNoise {
                std_kw,
                increase_uncertainty,
                rng,
            } => truth()
                .enumerate()
                .map(|(k, v)| {
                    let std = if *increase_uncertainty {
                        *std_kw * (1.0 + (1.0 + k as f64).ln())
                    } else {
                        *std_kw
                    };
                    (v + gaussian_noise(rng, std)).max(0.0)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> TimeSeries {
        TimeSeries::from_values(vec![0.0, 1.0, 2.0, 3.0, 4.0])
    }

    #[test]
    fn none_is_empty() {
        assert!(Forecaster::None.forecast(&series(), 3).is_empty());
    }

    #[test]
    fn oracle_returns_future_values() {
        let mut s = series();
        s.advance();
        assert_eq!(Forecaster::Oracle.forecast(&s, 2), vec![2.0, 3.0]);
    }

    #[test]
    fn forecast_truncates_at_series_end() {
        let mut s = series();
        s.advance();
        s.advance();
        s.advance();
        assert_eq!(Forecaster::Oracle.forecast(&s, 5), vec![4.0]);
    }

    #[test]
    fn persistence_repeats_current_value() {
        let mut s = series();
        s.advance();
        assert_eq!(Forecaster::Persistence.forecast(&s, 3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn constant_series_fills_horizon() {
        let s = TimeSeries::constant(2.5);
        assert_eq!(Forecaster::Oracle.forecast(&s, 4), vec![2.5; 4]);
    }

    #[test]
    fn gaussian_is_non_negative_and_seeded() {
        let s = TimeSeries::from_values(vec![0.0; 50]);
        let mut a = Forecaster::gaussian(1.0, true, 3);
        let mut b = Forecaster::gaussian(1.0, true, 3);
        let fa = a.forecast(&s, 40);
        assert_eq!(fa.len(), 40);
        assert!(fa.iter().all(|v| *v >= 0.0));
        assert_eq!(fa, b.forecast(&s, 40));
    }

    #[test]
    fn gaussian_without_noise_matches_oracle() {
        let s = series();
        let mut g = Forecaster::gaussian(0.0, false, 1);
        assert_eq!(g.forecast(&s, 3), Forecaster::Oracle.forecast(&s, 3));
        assert_eq!(g.name(), "gaussian");
    }
}
