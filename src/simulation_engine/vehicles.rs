use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier handed to every vehicle when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four approaches into the junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Slot of this direction in per-direction arrays.
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn bound_label(self) -> &'static str {
        match self {
            Direction::North => "Northbound",
            Direction::South => "Southbound",
            Direction::East => "Eastbound",
            Direction::West => "Westbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bound_label())
    }
}

/// Lifecycle of a single vehicle task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    Created,
    Queued,
    Head,
    Crossing,
    Retired,
}

impl VehicleState {
    /// The only state reachable from `self`, `None` once retired.
    pub fn next(self) -> Option<VehicleState> {
        match self {
            VehicleState::Created => Some(VehicleState::Queued),
            VehicleState::Queued => Some(VehicleState::Head),
            VehicleState::Head => Some(VehicleState::Crossing),
            VehicleState::Crossing => Some(VehicleState::Retired),
            VehicleState::Retired => None,
        }
    }
}

/// A vehicle approaching the junction. Both fields are fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub direction: Direction,
}

impl Vehicle {
    pub fn new(id: VehicleId, direction: Direction) -> Self {
        Self { id, direction }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} car with ID ({})", self.direction, self.id)
    }
}

/// Hands out vehicle ids, shared by every task of one junction.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_id: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id. Panics if the id space is exhausted.
    pub fn next(&self) -> VehicleId {
        let id = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .unwrap_or_else(|_| panic!("vehicle id space exhausted"));
        VehicleId(id)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}
