use crate::simulation_engine::vehicles::{Direction, VehicleId};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Proof of a place in a direction queue.
///
/// Not `Clone`: `DirectionQueue::leave` consumes it, so a vehicle cannot leave twice.
/// A ticket dropped without `leave` (an aborted vehicle task) takes its entry out
/// of the queue and, if it was the head, hands the turn to the next vehicle.
pub struct QueueTicket {
    vehicle: VehicleId,
    direction: Direction,
    position: u64,
    turn: Arc<Notify>,
    lane: Arc<Mutex<LaneState>>,
    // Cleared by `leave`, which has already removed the entry.
    queued: bool,
}

impl QueueTicket {
    pub fn vehicle(&self) -> VehicleId {
        self.vehicle
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Join sequence number within the direction, starting at 0.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl fmt::Debug for QueueTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueTicket")
            .field("vehicle", &self.vehicle)
            .field("direction", &self.direction)
            .field("position", &self.position)
            .field("queued", &self.queued)
            .finish()
    }
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        if !self.queued {
            return;
        }
        // May run while unwinding from a contract panic that poisoned the lock.
        let mut state = self.lane.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(index) = state
            .waiting
            .iter()
            .position(|w| Arc::ptr_eq(&w.turn, &self.turn))
        else {
            return;
        };
        state.waiting.remove(index);
        log::debug!(
            "{} car with ID ({}) dropped out of the queue at position {}",
            self.direction,
            self.vehicle,
            self.position
        );
        if index == 0 {
            if let Some(next) = state.waiting.front() {
                log::debug!(
                    "{} queue: head passes from {} to {}",
                    self.direction,
                    self.vehicle,
                    next.vehicle
                );
                next.turn.notify_one();
            }
        }
    }
}

struct WaitingVehicle {
    vehicle: VehicleId,
    // Signalled exactly once, when this entry reaches the head.
    turn: Arc<Notify>,
}

struct LaneState {
    waiting: VecDeque<WaitingVehicle>,
    joined: u64,
}

/// FIFO waiting line for one approach to the junction.
pub struct DirectionQueue {
    direction: Direction,
    state: Arc<Mutex<LaneState>>,
}

impl DirectionQueue {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: Arc::new(Mutex::new(LaneState {
                waiting: VecDeque::new(),
                joined: 0,
            })),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Appends `vehicle` to the tail. Never blocks.
    pub fn join(&self, vehicle: VehicleId) -> QueueTicket {
        let turn = Arc::new(Notify::new());
        let mut state = self.state.lock().expect("lane queue mutex poisoned");
        let position = state.joined;
        state.joined += 1;
        state.waiting.push_back(WaitingVehicle {
            vehicle,
            turn: Arc::clone(&turn),
        });
        if state.waiting.len() == 1 {
            // Empty queue: the newcomer is head right away. The permit is
            // stored until `await_turn` consumes it.
            turn.notify_one();
        }
        log::debug!(
            "{} car with ID ({}) joined queue at position {}",
            self.direction,
            vehicle,
            position
        );
        QueueTicket {
            vehicle,
            direction: self.direction,
            position,
            turn,
            lane: Arc::clone(&self.state),
            queued: true,
        }
    }

    /// Waits until the ticket's vehicle is at the head of the queue.
    pub async fn await_turn(&self, ticket: &QueueTicket) {
        self.check_owner(ticket);
        ticket.turn.notified().await;
        debug_assert_eq!(self.head(), Some(ticket.vehicle));
    }

    /// Removes the head vehicle and wakes its successor.
    ///
    /// Panics if the ticket's entry is not the current head.
    pub fn leave(&self, mut ticket: QueueTicket) {
        self.check_owner(&ticket);
        let mut state = self.state.lock().expect("lane queue mutex poisoned");
        match state.waiting.front() {
            Some(head) if Arc::ptr_eq(&head.turn, &ticket.turn) => {}
            Some(head) => panic!(
                "{} queue: leave by non-head vehicle {} (head is {})",
                self.direction, ticket.vehicle, head.vehicle
            ),
            None => panic!(
                "{} queue: leave by vehicle {} on an empty queue",
                self.direction, ticket.vehicle
            ),
        }
        state.waiting.pop_front();
        ticket.queued = false;
        if let Some(next) = state.waiting.front() {
            log::debug!(
                "{} queue: head passes from {} to {}",
                self.direction,
                ticket.vehicle,
                next.vehicle
            );
            next.turn.notify_one();
        }
    }

    pub fn head(&self) -> Option<VehicleId> {
        let state = self.state.lock().expect("lane queue mutex poisoned");
        state.waiting.front().map(|w| w.vehicle)
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("lane queue mutex poisoned");
        state.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the waiting line, head first.
    pub fn waiting(&self) -> Vec<VehicleId> {
        let state = self.state.lock().expect("lane queue mutex poisoned");
        state.waiting.iter().map(|w| w.vehicle).collect()
    }

    /// Total number of joins since creation.
    pub fn joined(&self) -> u64 {
        let state = self.state.lock().expect("lane queue mutex poisoned");
        state.joined
    }

    fn check_owner(&self, ticket: &QueueTicket) {
        assert_eq!(
            ticket.direction, self.direction,
            "ticket for vehicle {} belongs to the {} queue",
            ticket.vehicle, ticket.direction
        );
    }
}

/// One queue per direction, indexed by `Direction::index`.
pub fn create_lanes() -> [DirectionQueue; 4] {
    Direction::ALL.map(DirectionQueue::new)
}
