/// Tick pacing for simulated and realtime runs.
pub mod clock;
pub mod controller;
pub mod engine;
pub mod kpi;
pub mod power_balance;
pub mod types;
