//! Microgrid dispatch simulator for compute-node clusters.
//!
//! Each configured microgrid couples a battery, PV production, a grid tie and
//! a set of compute nodes whose power draw follows the CPU load recorded in
//! SQLite. The [`runner::Runner`] steps every grid, stores state of charge and
//! posts the aggregated state to the HTTP service in [`api`].

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod io;
pub mod modules;
pub mod power_table;
pub mod publisher;
pub mod runner;
/// Simulation engine, controllers, clock and KPIs.
pub mod sim;
