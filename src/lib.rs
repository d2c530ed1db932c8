//! Four-way crossing simulator.
//!
//! Vehicles arrive on four approaches, wait in a FIFO queue per direction and
//! cross a shared intersection one at a time. Every vehicle is its own tokio
//! task; waiting is wait/notify, never polling.

pub mod config;
pub mod global_variables;
pub mod monitoring;
pub mod shared_data;
pub mod simulation_engine;

pub use config::SimulationConfig;
pub use shared_data::{CrossingEvent, EventKind, SimulationSummary};
pub use simulation_engine::events::CrossingObserver;
pub use simulation_engine::simulation::{run_simulation, spawn_vehicle, Junction};
pub use simulation_engine::vehicles::{Direction, VehicleId};
