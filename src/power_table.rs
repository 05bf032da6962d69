//! CPU utilisation to electrical power lookup.

/// Per-server power draw at a given CPU utilisation.
///
/// Points are `(cpu_pct, watts)`, strictly increasing in CPU. Lookups clamp
/// CPU to `[0, 100]` and interpolate linearly between points; beyond the
/// first or last point the edge value is held.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerTable {
    points: Vec<(f64, f64)>,
}

impl Default for PowerTable {
    fn default() -> Self {
        Self {
            points: vec![
                (0.0, 60.0),
                (10.0, 85.0),
                (20.0, 100.0),
                (30.0, 112.0),
                (40.0, 124.0),
                (50.0, 136.0),
                (60.0, 150.0),
                (70.0, 166.0),
                (80.0, 184.0),
                (90.0, 204.0),
                (100.0, 226.0),
            ],
        }
    }
}

impl PowerTable {
    /// Builds a table from `(cpu_pct, watts)` points.
    ///
    /// # Errors
    ///
    /// Returns a message if the table is empty, not strictly increasing in
    /// CPU, or contains negative or non-finite values.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, String> {
        if points.is_empty() {
            return Err("table must have at least one point".into());
        }
        for (cpu, watts) in &points {
            if !cpu.is_finite() || !watts.is_finite() || *watts < 0.0 {
                return Err(format!("invalid point ({cpu}, {watts})"));
            }
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err("cpu_pct must be strictly increasing".into());
        }
        Ok(Self { points })
    }

    /// Power draw of one server at `cpu_pct` (W).
    pub fn watts(&self, cpu_pct: f64) -> f64 {
        let cpu = if cpu_pct.is_nan() { 0.0 } else { cpu_pct.clamp(0.0, 100.0) };

        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return 0.0,
        };
        if cpu <= first.0 {
            return first.1;
        }
        if cpu >= last.0 {
            return last.1;
        }

        self.points
            .windows(2)
            .find(|w| cpu <= w[1].0)
            .map(|w| {
                let (x0, y0) = w[0];
                let (x1, y1) = w[1];
                y0 + (y1 - y0) * (cpu - x0) / (x1 - x0)
            })
            .unwrap_or(last.1)
    }

    /// Power draw of `count` servers at `cpu_pct` (kW).
    pub fn node_kw(&self, cpu_pct: f64, count: u32) -> f64 {
        self.watts(cpu_pct) * count as f64 / 1000.0
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}
