mod format;
mod loadcase;
mod schema;

pub mod config;
pub mod dump;
pub mod gate;
pub mod gateway;
pub mod hook;
pub mod logger;
pub mod model;
pub mod network;
pub mod phases;

pub use config::{Config, ConfigBuilder, ConfigError, SolverSetting};
pub use dump::{DumpError, DumpSummary};
pub use gate::{CallGate, GateError, ModuleHandle, NativeGate, ProcessGate};
pub use gateway::{Gateway, Status};
pub use hook::{DumpHook, HookOutcome};
pub use loadcase::*;
pub use logger::{Severity, SolverLog};
pub use model::{Model, Value};
pub use network::*;
pub use phases::phase_name;
pub use schema::{branch_columns, bus_columns};

#[cfg(test)]
mod tests;
