use crate::simulation_engine::vehicles::{Direction, Vehicle, VehicleId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

/// The shared junction. At most one vehicle is inside at any instant.
pub struct Intersection {
    gate: AsyncMutex<()>,
    occupant: Mutex<Option<Vehicle>>,
    crossings: AtomicU64,
}

impl Intersection {
    pub fn new() -> Self {
        Self {
            gate: AsyncMutex::new(()),
            occupant: Mutex::new(None),
            crossings: AtomicU64::new(0),
        }
    }

    /// Waits until the junction is free, then marks `vehicle` as inside.
    /// The junction is released when the returned guard is dropped.
    pub async fn acquire(&self, vehicle: Vehicle) -> CrossingGuard<'_> {
        let permit = self.gate.lock().await;
        {
            let mut occupant = self.occupant.lock().expect("occupant mutex poisoned");
            if let Some(inside) = *occupant {
                panic!("{} entered while {} is still inside", vehicle, inside);
            }
            *occupant = Some(vehicle);
        }
        CrossingGuard {
            intersection: self,
            vehicle,
            _permit: permit,
        }
    }

    /// Vehicle currently inside, if any.
    pub fn occupant(&self) -> Option<(VehicleId, Direction)> {
        let occupant = *self.occupant.lock().expect("occupant mutex poisoned");
        occupant.map(|v| (v.id, v.direction))
    }

    pub fn is_free(&self) -> bool {
        self.occupant().is_none()
    }

    /// Completed crossings since creation.
    pub fn crossings(&self) -> u64 {
        self.crossings.load(Ordering::Relaxed)
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on the junction for one crossing.
pub struct CrossingGuard<'a> {
    intersection: &'a Intersection,
    vehicle: Vehicle,
    _permit: AsyncMutexGuard<'a, ()>,
}

impl CrossingGuard<'_> {
    pub fn vehicle(&self) -> Vehicle {
        self.vehicle
    }

    /// Frees the junction. Same as dropping the guard.
    pub fn release(self) {}
}

impl Drop for CrossingGuard<'_> {
    fn drop(&mut self) {
        // Clear the occupant before the gate permit is dropped.
        let mut occupant = self
            .intersection
            .occupant
            .lock()
            .expect("occupant mutex poisoned");
        match occupant.take() {
            Some(inside) if inside == self.vehicle => {}
            other => panic!(
                "{} released the intersection but the occupant was {:?}",
                self.vehicle, other
            ),
        }
        self.intersection.crossings.fetch_add(1, Ordering::Relaxed);
    }
}
