//! Dispatch policies deciding battery and grid power each tick.

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::power_balance::net_load_kw;
use super::types::{Dispatch, StepInput, StepLimits};

/// A per-tick dispatch policy.
pub trait Controller {
    /// Decides battery, grid and curtailment power for one tick.
    ///
    /// The returned dispatch must satisfy the power balance (see
    /// [`super::power_balance::balance_residual_kw`]) and stay within `limits`.
    fn dispatch(&mut self, input: &StepInput, limits: &StepLimits) -> Dispatch;

    /// Short policy name for logs.
    fn name(&self) -> &'static str;
}

/// Greedy rule-based controller.
///
/// A deficit is covered by the battery first, then the grid; whatever is
/// left is unserved. A surplus charges the battery first, then is exported;
/// whatever is left is curtailed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyController;

impl Controller for GreedyController {
    fn dispatch(&mut self, input: &StepInput, limits: &StepLimits) -> Dispatch {
        let net = net_load_kw(input.load_kw, input.renewable_kw);

        if net > 0.0 {
            let discharge = net.min(limits.max_discharge_kw.max(0.0));
            let remaining = net - discharge;
            let import = remaining.min(limits.max_import_kw.max(0.0));
            Dispatch {
                battery_kw: -discharge,
                import_kw: import,
                export_kw: 0.0,
                curtailment_kw: 0.0,
                loss_load_kw: remaining - import,
            }
        } else if net < 0.0 {
            let surplus = -net;
            let charge = surplus.min(limits.max_charge_kw.max(0.0));
            let remaining = surplus - charge;
            let export = remaining.min(limits.max_export_kw.max(0.0));
            Dispatch {
                battery_kw: charge,
                import_kw: 0.0,
                export_kw: export,
                curtailment_kw: remaining - export,
                loss_load_kw: 0.0,
            }
        } else {
            Dispatch::default()
        }
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

/// Baseline controller that samples a random feasible battery setpoint.
///
/// The grid settles whatever the battery leaves over (see [`settle_on_grid`]).
#[derive(Debug, Clone)]
pub struct RandomController {
    rng: StdRng,
}

impl RandomController {
    /// Creates a seeded random controller.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Controller for RandomController {
    fn dispatch(&mut self, input: &StepInput, limits: &StepLimits) -> Dispatch {
        let lo = -limits.max_discharge_kw.max(0.0);
        let hi = limits.max_charge_kw.max(0.0);
        let battery_kw = if hi - lo > f64::EPSILON {
            self.rng.random_range(lo..=hi)
        } else {
            0.0
        };
        settle_on_grid(
            net_load_kw(input.load_kw, input.renewable_kw),
            battery_kw,
            input.renewable_kw,
            limits,
        )
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Policy chosen at runtime, erasing the `Controller` generic via enum dispatch.
#[derive(Debug, Clone)]
pub enum DispatchPolicy {
    Greedy(GreedyController),
    Random(RandomController),
}

impl Controller for DispatchPolicy {
    fn dispatch(&mut self, input: &StepInput, limits: &StepLimits) -> Dispatch {
        match self {
            Self::Greedy(c) => c.dispatch(input, limits),
            Self::Random(c) => c.dispatch(input, limits),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Greedy(c) => c.name(),
            Self::Random(c) => c.name(),
        }
    }
}

/// Balances a fixed battery power against the grid.
///
/// A remaining deficit is imported up to the import limit and the rest is
/// unserved. A remaining surplus is exported up to the export limit, then
/// renewable production is curtailed; if the battery discharge alone still
/// overshoots, the discharge is reduced.
///
/// # Arguments
///
/// * `net_kw` - Net load (demand minus renewable production)
/// * `battery_kw` - Battery power (positive = charge, negative = discharge)
/// * `renewable_kw` - Available renewable production, bounding curtailment
/// * `limits` - Grid import/export limits
pub fn settle_on_grid(
    net_kw: f64,
    battery_kw: f64,
    renewable_kw: f64,
    limits: &StepLimits,
) -> Dispatch {
    let residual = net_kw + battery_kw;

    if residual >= 0.0 {
        let import = residual.min(limits.max_import_kw.max(0.0));
        Dispatch {
            battery_kw,
            import_kw: import,
            export_kw: 0.0,
            curtailment_kw: 0.0,
            loss_load_kw: residual - import,
        }
    } else {
        let surplus = -residual;
        let export = surplus.min(limits.max_export_kw.max(0.0));
        let mut rest = surplus - export;
        let curtailment = rest.min(renewable_kw.max(0.0));
        rest -= curtailment;
        Dispatch {
            battery_kw: battery_kw + rest,
            import_kw: 0.0,
            export_kw: export,
            curtailment_kw: curtailment,
            loss_load_kw: 0.0,
        }
    }
}
