//! Microgrid modules and the factory wiring them together.

pub mod battery;
pub mod factory;
pub mod grid;
pub mod load;
pub mod node;
pub mod renewable;
pub mod types;

pub use battery::BatteryModule;
pub use factory::build_microgrid;
pub use grid::{GridModule, GridStep};
pub use load::LoadModule;
pub use node::NodeModule;
pub use renewable::{RenewableModule, RenewableStep};
pub use types::{Module, ModuleKind, ModuleSnapshot, TimeSeries};
