// src/shared_data.rs

use crate::simulation_engine::vehicles::{Direction, VehicleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which half of a crossing an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Enter,
    Leave,
}

/// One enter or leave notification. Flat so it maps onto a CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingEvent {
    /// Junction-wide order, assigned while the intersection is held.
    pub seq: u64,
    pub kind: EventKind,
    pub direction: Direction,
    pub vehicle_id: VehicleId,
    /// Join sequence number within the vehicle's direction queue.
    pub queue_position: u64,
    pub timestamp_micros: u64,
}

/// Outcome of a run, printed as JSON by the driver binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub spawned: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub elapsed_ms: u64,
    pub mean_queue_wait_us: u64,
    pub max_queue_wait_us: u64,
    pub per_direction: BTreeMap<String, usize>,
}

/// Microseconds since the unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
