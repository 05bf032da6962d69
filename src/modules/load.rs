use crate::modules::types::{Module, ModuleKind, ModuleSnapshot, TimeSeries};

/// Fixed base load of a microgrid, from a series or a static value.
#[derive(Debug, Clone)]
pub struct LoadModule {
    series: TimeSeries,
}

impl LoadModule {
    pub fn new(series: TimeSeries) -> Self {
        Self { series }
    }

    /// Demand for the current tick (kW, never negative).
    pub fn current_load_kw(&self) -> f64 {
        self.series.current().max(0.0)
    }
}

impl Module for LoadModule {
    fn module_type(&self) -> &'static str {
        "load"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Sink
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
        ModuleSnapshot::of(self, &[("load_current_kw", self.current_load_kw())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_load_never_finishes() {
        let mut l = LoadModule::new(TimeSeries::constant(0.4));
        l.advance();
        assert_eq!(l.current_load_kw(), 0.4);
        assert!(!l.done());
    }

    #[test]
    fn series_load_follows_cursor() {
        let mut l = LoadModule::new(TimeSeries::from_values(vec![1.0, -2.0]));
        assert_eq!(l.current_load_kw(), 1.0);
        l.advance();
        assert_eq!(l.current_load_kw(), 0.0);
        l.advance();
        assert!(l.done());
    }
}
