use crate::modules::types::{Module, ModuleKind, ModuleSnapshot};
use crate::sim::types::SimConfig;

/// A battery energy storage module.
///
/// Stored energy stays within `[min_capacity_kwh, max_capacity_kwh]`. A
/// single round-trip `efficiency` applies on both sides: charging at `p` kW
/// stores `p * dt * efficiency` kWh, discharging at `p` kW removes
/// `p * dt / efficiency` kWh.
///
/// # Power Convention
/// - Positive setpoint/return: charging (a sink on the bus)
/// - Negative setpoint/return: discharging (a source on the bus)
#[derive(Debug, Clone)]
pub struct BatteryModule {
    /// Lowest allowed stored energy (kWh).
    pub min_capacity_kwh: f64,

    /// Highest allowed stored energy (kWh).
    pub max_capacity_kwh: f64,

    /// Maximum charging power (kW, positive).
    pub max_charge_kw: f64,

    /// Maximum discharging power (kW, positive).
    pub max_discharge_kw: f64,

    /// Charge and discharge efficiency (0..=1.0).
    pub efficiency: f64,

    init_charge_kwh: f64,
    current_charge_kwh: f64,
    dt_hours: f64,
}

impl BatteryModule {
    /// Creates a new battery module.
    ///
    /// # Arguments
    ///
    /// * `min_capacity_kwh` - Lowest allowed stored energy
    /// * `max_capacity_kwh` - Highest allowed stored energy (must be > 0)
    /// * `max_charge_kw` - Maximum charging power
    /// * `max_discharge_kw` - Maximum discharging power
    /// * `efficiency` - Charge/discharge efficiency in (0, 1]
    /// * `init_soc` - Initial state of charge as a fraction of `max_capacity_kwh`
    /// * `config` - Simulation configuration for timing
    ///
    /// # Panics
    ///
    /// Panics if capacities are inconsistent, limits negative, efficiency
    /// outside (0, 1], or the initial charge falls outside the capacity window.
    pub fn new(
        min_capacity_kwh: f64,
        max_capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        efficiency: f64,
        init_soc: f64,
        config: &SimConfig,
    ) -> Self {
        assert!(max_capacity_kwh > 0.0);
        assert!((0.0..=max_capacity_kwh).contains(&min_capacity_kwh));
        assert!(max_charge_kw >= 0.0 && max_discharge_kw >= 0.0);
        assert!(efficiency > 0.0 && efficiency <= 1.0);
        assert!((0.0..=1.0).contains(&init_soc));

        let init_charge_kwh = init_soc * max_capacity_kwh;
        assert!(init_charge_kwh >= min_capacity_kwh);

        Self {
            min_capacity_kwh,
            max_capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            efficiency,
            init_charge_kwh,
            current_charge_kwh: init_charge_kwh,
            dt_hours: config.dt_hours,
        }
    }

    /// State of charge as a fraction of `max_capacity_kwh`.
    pub fn soc(&self) -> f64 {
        self.current_charge_kwh / self.max_capacity_kwh
    }

    /// Stored energy (kWh).
    pub fn current_charge_kwh(&self) -> f64 {
        self.current_charge_kwh
    }

    /// Largest charging power feasible this tick (kW).
    pub fn max_consumption_kw(&self) -> f64 {
        let headroom = (self.max_capacity_kwh - self.current_charge_kwh).max(0.0);
        (headroom / (self.efficiency * self.dt_hours)).min(self.max_charge_kw)
    }

    /// Largest discharging power feasible this tick (kW).
    pub fn max_production_kw(&self) -> f64 {
        let available = (self.current_charge_kwh - self.min_capacity_kwh).max(0.0);
        (available * self.efficiency / self.dt_hours).min(self.max_discharge_kw)
    }

    /// Charges at up to `kw`, returning the power actually absorbed.
    pub fn charge(&mut self, kw: f64) -> f64 {
        let actual = kw.clamp(0.0, self.max_consumption_kw());
        self.current_charge_kwh += actual * self.dt_hours * self.efficiency;
        self.current_charge_kwh = self
            .current_charge_kwh
            .clamp(self.min_capacity_kwh, self.max_capacity_kwh);
        actual
    }

    /// Discharges at up to `kw`, returning the power actually delivered.
    pub fn discharge(&mut self, kw: f64) -> f64 {
        let actual = kw.clamp(0.0, self.max_production_kw());
        self.current_charge_kwh -= actual * self.dt_hours / self.efficiency;
        self.current_charge_kwh = self
            .current_charge_kwh
            .clamp(self.min_capacity_kwh, self.max_capacity_kwh);
        actual
    }

    /// Applies a signed setpoint and returns the signed power actually realised.
    pub fn apply_setpoint(&mut self, setpoint_kw: f64) -> f64 {
        if setpoint_kw > 0.0 {
            self.charge(setpoint_kw)
        } else if setpoint_kw < 0.0 {
            -self.discharge(-setpoint_kw)
        } else {
            0.0
        }
    }
}

impl Module for BatteryModule {
    fn module_type(&self) -> &'static str {
        "battery"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Storage
    }

    fn reset(&mut self) {
        self.current_charge_kwh = self.init_charge_kwh;
    }

    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot::of(
            self,
            &[
                ("soc", self.soc()),
                ("current_charge_kwh", self.current_charge_kwh),
                ("max_charge_now_kw", self.max_consumption_kw()),
                ("max_discharge_now_kw", self.max_production_kw()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(steps_per_day: usize) -> SimConfig {
        SimConfig::new(steps_per_day, 1, 0)
    }

    #[test]
    fn new_battery_starts_at_init_soc() {
        let b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 0.95, 0.5, &cfg(24));
        assert_eq!(b.soc(), 0.5);
        assert_eq!(b.current_charge_kwh(), 5.0);
        assert_eq!(b.module_type(), "battery");
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        BatteryModule::new(0.0, 0.0, 5.0, 5.0, 0.95, 0.5, &cfg(24));
    }

    #[test]
    #[should_panic]
    fn init_below_min_capacity_panics() {
        BatteryModule::new(4.0, 10.0, 5.0, 5.0, 0.95, 0.2, &cfg(24));
    }

    #[test]
    #[should_panic]
    fn zero_efficiency_panics() {
        BatteryModule::new(0.0, 10.0, 5.0, 5.0, 0.0, 0.5, &cfg(24));
    }

    #[test]
    fn charge_is_limited_by_power() {
        let mut b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 1.0, 0.1, &cfg(24));
        assert_eq!(b.apply_setpoint(8.0), 5.0);
    }

    #[test]
    fn discharge_is_limited_by_power() {
        let mut b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 1.0, 0.9, &cfg(24));
        assert_eq!(b.apply_setpoint(-8.0), -5.0);
    }

    #[test]
    fn charge_is_limited_by_headroom() {
        // 1 kWh of headroom, 15 minute ticks, perfect efficiency -> 4 kW
        let mut b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 1.0, 0.9, &cfg(96));
        assert!((b.max_consumption_kw() - 4.0).abs() < 1e-9);
        let actual = b.apply_setpoint(5.0);
        assert!((actual - 4.0).abs() < 1e-9);
        assert!((b.soc() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn discharge_stops_at_min_capacity() {
        // 2 kWh stored, 1 kWh floor, 1 h ticks -> 1 kW available
        let mut b = BatteryModule::new(1.0, 10.0, 5.0, 5.0, 1.0, 0.2, &cfg(24));
        let actual = b.apply_setpoint(-5.0);
        assert!((actual + 1.0).abs() < 1e-9);
        assert!((b.current_charge_kwh() - 1.0).abs() < 1e-9);
        assert_eq!(b.max_production_kw(), 0.0);
    }

    #[test]
    fn efficiency_losses_apply_both_ways() {
        // 6 h ticks: 1 kW charge stores 6 * 0.9 = 5.4 kWh
        let mut b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 0.9, 0.0, &cfg(4));
        b.apply_setpoint(1.0);
        assert!((b.current_charge_kwh() - 5.4).abs() < 1e-9);

        // 0.5 kW discharge delivers 3 kWh and removes 3 / 0.9 kWh
        b.apply_setpoint(-0.5);
        assert!((b.current_charge_kwh() - (5.4 - 3.0 / 0.9)).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_initial_charge() {
        let mut b = BatteryModule::new(0.0, 10.0, 5.0, 5.0, 1.0, 0.5, &cfg(24));
        b.apply_setpoint(-3.0);
        b.reset();
        assert_eq!(b.soc(), 0.5);
        assert_eq!(b.snapshot().values["soc"], 0.5);
    }

    #[test]
    fn full_cycle_delivers_efficiency_scaled_energy() {
        let c = cfg(24);
        let mut b = BatteryModule::new(0.0, 10.0, 2.0, 2.0, 0.9, 0.5, &c);
        while b.soc() < 0.999 {
            b.apply_setpoint(2.0);
        }
        let mut delivered = 0.0;
        while b.soc() > 0.001 {
            delivered += -b.apply_setpoint(-2.0) * c.dt_hours;
        }
        assert!((delivered - 9.0).abs() < 0.05);
    }
}
