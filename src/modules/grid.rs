use serde::Serialize;

use crate::modules::types::{Module, ModuleKind, ModuleSnapshot, TimeSeries};
use crate::sim::types::SimConfig;

/// Result of exchanging power with the grid for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridStep {
    /// Imported power after clipping (kW).
    pub import_kw: f64,
    /// Exported power after clipping (kW).
    pub export_kw: f64,
    /// Import cost minus export revenue for the tick.
    pub cost: f64,
    /// CO2 emitted by the imported energy (kg).
    pub co2_kg: f64,
}

/// A grid tie with import/export limits, tariffs and carbon intensity.
#[derive(Debug, Clone)]
pub struct GridModule {
    /// Import limit (kW, >= 0).
    pub max_import_kw: f64,
    /// Export limit (kW, >= 0).
    pub max_export_kw: f64,
    import_price: TimeSeries,
    export_price: TimeSeries,
    co2_per_kwh: TimeSeries,
    dt_hours: f64,
}

impl GridModule {
    /// Creates a grid tie.
    ///
    /// # Panics
    ///
    /// Panics if either limit is negative.
    pub fn new(
        max_import_kw: f64,
        max_export_kw: f64,
        import_price: TimeSeries,
        export_price: TimeSeries,
        co2_per_kwh: TimeSeries,
        config: &SimConfig,
    ) -> Self {
        assert!(max_import_kw >= 0.0 && max_export_kw >= 0.0);
        Self {
            max_import_kw,
            max_export_kw,
            import_price,
            export_price,
            co2_per_kwh,
            dt_hours: config.dt_hours,
        }
    }

    /// Import tariff for the current tick (per kWh).
    pub fn import_price(&self) -> f64 {
        self.import_price.current()
    }

    /// Export tariff for the current tick (per kWh).
    pub fn export_price(&self) -> f64 {
        self.export_price.current()
    }

    /// Carbon intensity for the current tick (kg CO2 per kWh).
    pub fn co2_per_kwh(&self) -> f64 {
        self.co2_per_kwh.current()
    }

    /// Exchanges power with the grid, clipping requests to the limits.
    pub fn update(&mut self, import_kw: f64, export_kw: f64) -> GridStep {
        let import_kw = import_kw.clamp(0.0, self.max_import_kw);
        let export_kw = export_kw.clamp(0.0, self.max_export_kw);
        let import_kwh = import_kw * self.dt_hours;
        let export_kwh = export_kw * self.dt_hours;

        GridStep {
            import_kw,
            export_kw,
            cost: import_kwh * self.import_price() - export_kwh * self.export_price(),
            co2_kg: import_kwh * self.co2_per_kwh(),
        }
    }
}

impl Module for GridModule {
    fn module_type(&self) -> &'static str {
        "grid"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Exchange
    }

    fn advance(&mut self) {
        self.import_price.advance();
        self.export_price.advance();
        self.co2_per_kwh.advance();
    }

    fn reset(&mut self) {
        self.import_price.reset();
        self.export_price.reset();
        self.co2_per_kwh.reset();
    }

    fn done(&self) -> bool {
        self.import_price.done() || self.export_price.done() || self.co2_per_kwh.done()
    }

    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot::of(
            self,
            &[
                ("import_price", self.import_price()),
                ("export_price", self.export_price()),
                ("co2_per_kwh", self.co2_per_kwh()),
                ("max_import_kw", self.max_import_kw),
                ("max_export_kw", self.max_export_kw),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cfg: &SimConfig) -> GridModule {
        GridModule::new(
            10.0,
            5.0,
            TimeSeries::constant(0.3),
            TimeSeries::constant(0.1),
            TimeSeries::from_values(vec![0.4, 0.2]),
            cfg,
        )
    }

    #[test]
    fn import_costs_and_emits() {
        let cfg = SimConfig::new(24, 1, 0);
        let step = grid(&cfg).update(2.0, 0.0);
        assert!((step.cost - 0.6).abs() < 1e-12);
        assert!((step.co2_kg - 0.8).abs() < 1e-12);
    }

    #[test]
    fn export_earns_revenue() {
        let cfg = SimConfig::new(96, 1, 0);
        let step = grid(&cfg).update(0.0, 4.0);
        // 4 kW for 15 min = 1 kWh at 0.1
        assert!((step.cost + 0.1).abs() < 1e-12);
        assert_eq!(step.co2_kg, 0.0);
    }

    #[test]
    fn requests_are_clipped_to_limits() {
        let cfg = SimConfig::new(24, 1, 0);
        let mut g = grid(&cfg);
        let step = g.update(50.0, 50.0);
        assert_eq!(step.import_kw, 10.0);
        assert_eq!(step.export_kw, 5.0);
        let step = g.update(-1.0, -1.0);
        assert_eq!(step.import_kw, 0.0);
        assert_eq!(step.export_kw, 0.0);
    }

    #[test]
    fn carbon_series_advances_and_finishes() {
        let cfg = SimConfig::new(24, 1, 0);
        let mut g = grid(&cfg);
        g.advance();
        assert_eq!(g.co2_per_kwh(), 0.2);
        assert!(!g.done());
        g.advance();
        assert!(g.done());
        g.reset();
        assert_eq!(g.co2_per_kwh(), 0.4);
    }
}
