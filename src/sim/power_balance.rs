//! Microgrid power balance computation.

use super::types::Dispatch;

/// Net load seen by the storage and grid-tie modules.
///
/// Positive means demand exceeds renewable production (deficit), negative
/// means a renewable surplus.
pub fn net_load_kw(load_kw: f64, renewable_kw: f64) -> f64 {
    load_kw - renewable_kw
}

/// Residual of the power balance for a dispatch decision.
///
/// Sources (renewable used, battery discharge, grid import, unserved load)
/// must equal sinks (demand, battery charge, grid export). Returns
/// `sources - sinks`; a balanced dispatch yields zero.
///
/// # Arguments
///
/// * `load_kw` - Total demand
/// * `renewable_kw` - Available renewable production
/// * `dispatch` - Battery, grid and curtailment decisions
pub fn balance_residual_kw(load_kw: f64, renewable_kw: f64, dispatch: &Dispatch) -> f64 {
    let renewable_used = renewable_kw - dispatch.curtailment_kw;
    let sources =
        renewable_used + dispatch.discharge_kw() + dispatch.import_kw + dispatch.loss_load_kw;
    let sinks = load_kw + dispatch.charge_kw() + dispatch.export_kw;
    sources - sinks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deficit_is_positive() {
        assert_eq!(net_load_kw(3.0, 1.0), 2.0);
    }

    #[test]
    fn surplus_is_negative() {
        assert_eq!(net_load_kw(1.0, 4.0), -3.0);
    }

    #[test]
    fn balanced_discharge_and_import() {
        // load 5, pv 1 -> deficit 4 = discharge 3 + import 1
        let d = Dispatch {
            battery_kw: -3.0,
            import_kw: 1.0,
            ..Dispatch::default()
        };
        assert!(balance_residual_kw(5.0, 1.0, &d).abs() < 1e-12);
    }

    #[test]
    fn balanced_charge_export_and_curtail() {
        // load 1, pv 6 -> surplus 5 = charge 2 + export 2 + curtail 1
        let d = Dispatch {
            battery_kw: 2.0,
            export_kw: 2.0,
            curtailment_kw: 1.0,
            ..Dispatch::default()
        };
        assert!(balance_residual_kw(1.0, 6.0, &d).abs() < 1e-12);
    }

    #[test]
    fn unbalanced_dispatch_reports_shortfall() {
        // deficit 4 but only 1 kW supplied
        let d = Dispatch {
            import_kw: 1.0,
            ..Dispatch::default()
        };
        assert!((balance_residual_kw(5.0, 1.0, &d) + 3.0).abs() < 1e-12);
    }
}
