// simulation.rs
use crate::config::SimulationConfig;
use crate::shared_data::{current_timestamp, CrossingEvent, EventKind, SimulationSummary};
use crate::simulation_engine::events::CrossingObserver;
use crate::simulation_engine::intersections::Intersection;
use crate::simulation_engine::lanes::{create_lanes, DirectionQueue, QueueTicket};
use crate::simulation_engine::vehicles::{Direction, IdAllocator, Vehicle, VehicleState};

use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, timeout_at, Duration};

/// Spawn order within one round, as in the classic program.
pub const SPAWN_ORDER: [Direction; 4] = [
    Direction::South,
    Direction::North,
    Direction::West,
    Direction::East,
];

/// Everything vehicles of one junction share: id counter, the four approach
/// queues, the intersection itself and the event sink.
pub struct Junction {
    ids: IdAllocator,
    lanes: [DirectionQueue; 4],
    intersection: Intersection,
    observer: Arc<dyn CrossingObserver>,
    event_seq: AtomicU64,
}

impl Junction {
    pub fn new(observer: Arc<dyn CrossingObserver>) -> Arc<Self> {
        Arc::new(Self {
            ids: IdAllocator::new(),
            lanes: create_lanes(),
            intersection: Intersection::new(),
            observer,
            event_seq: AtomicU64::new(0),
        })
    }

    pub fn lane(&self, direction: Direction) -> &DirectionQueue {
        &self.lanes[direction.index()]
    }

    pub fn intersection(&self) -> &Intersection {
        &self.intersection
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Vehicles currently waiting or crossing, over all directions.
    pub fn waiting(&self) -> usize {
        self.lanes.iter().map(DirectionQueue::len).sum()
    }

    // Only called with the intersection held, so `seq` follows crossing order.
    fn emit(&self, kind: EventKind, ticket: &QueueTicket) {
        let event = CrossingEvent {
            seq: self.event_seq.fetch_add(1, Ordering::Relaxed),
            kind,
            direction: ticket.direction(),
            vehicle_id: ticket.vehicle(),
            queue_position: ticket.position(),
            timestamp_micros: current_timestamp(),
        };
        match kind {
            EventKind::Enter => self.observer.on_enter(&event),
            EventKind::Leave => self.observer.on_leave(&event),
        }
    }
}

/// What a retired vehicle reports back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingRecord {
    pub vehicle: Vehicle,
    pub queue_position: u64,
    /// Time between joining the queue and entering the intersection.
    pub queue_wait: Duration,
}

/// A vehicle that has an id and a place in its direction queue.
pub struct QueuedVehicle {
    junction: Arc<Junction>,
    vehicle: Vehicle,
    ticket: QueueTicket,
    state: VehicleState,
    joined_at: Instant,
}

/// Created -> Queued: takes an id and joins the direction queue.
///
/// Join order is fixed when this returns, which lets a driver decide the
/// crossing order of a direction before any task runs.
pub fn enqueue(junction: &Arc<Junction>, direction: Direction) -> QueuedVehicle {
    let vehicle = Vehicle::new(junction.ids.next(), direction);
    let ticket = junction.lane(direction).join(vehicle.id);
    log::trace!("{} {:?} -> {:?}", vehicle, VehicleState::Created, VehicleState::Queued);
    QueuedVehicle {
        junction: Arc::clone(junction),
        vehicle,
        ticket,
        state: VehicleState::Queued,
        joined_at: Instant::now(),
    }
}

impl QueuedVehicle {
    pub fn vehicle(&self) -> Vehicle {
        self.vehicle
    }

    pub fn queue_position(&self) -> u64 {
        self.ticket.position()
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    fn advance(&mut self, to: VehicleState) {
        debug_assert_eq!(self.state.next(), Some(to));
        log::trace!("{} {:?} -> {:?}", self.vehicle, self.state, to);
        self.state = to;
    }

    /// Queued -> Head -> Crossing -> Retired.
    pub async fn cross(mut self) -> CrossingRecord {
        let junction = Arc::clone(&self.junction);
        let lane = junction.lane(self.vehicle.direction);

        lane.await_turn(&self.ticket).await;
        self.advance(VehicleState::Head);

        let guard = junction.intersection.acquire(self.vehicle).await;
        let queue_wait = self.joined_at.elapsed();
        self.advance(VehicleState::Crossing);
        junction.emit(EventKind::Enter, &self.ticket);

        junction.emit(EventKind::Leave, &self.ticket);
        guard.release();
        self.advance(VehicleState::Retired);

        let queue_position = self.ticket.position();
        lane.leave(self.ticket);

        CrossingRecord {
            vehicle: self.vehicle,
            queue_position,
            queue_wait,
        }
    }
}

/// Full lifecycle of one vehicle: id, queue, intersection, retirement.
pub async fn simulate_vehicle_journey(
    junction: Arc<Junction>,
    direction: Direction,
) -> CrossingRecord {
    enqueue(&junction, direction).cross().await
}

/// Starts one vehicle task for `direction`.
pub fn spawn_vehicle(junction: &Arc<Junction>, direction: Direction) -> JoinHandle<CrossingRecord> {
    tokio::spawn(simulate_vehicle_journey(Arc::clone(junction), direction))
}

/// Runs the whole scenario on a fresh junction and reports how it went.
pub async fn run_simulation(
    config: &SimulationConfig,
    observer: Arc<dyn CrossingObserver>,
) -> SimulationSummary {
    let junction = Junction::new(observer);
    drive(&junction, config).await
}

/// Spawns `cars_per_direction` rounds of South, North, West, East vehicles on
/// `junction`, then waits until every vehicle retired or the run duration
/// expired. Vehicles still queued at the deadline are aborted and counted as
/// abandoned; their queue entries go with them, so `junction` stays usable.
pub async fn drive(junction: &Arc<Junction>, config: &SimulationConfig) -> SimulationSummary {
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + config.run_duration();

    log::info!(
        "Spawning {} vehicles per direction ({} total), run limit {}s",
        config.cars_per_direction,
        config.total_vehicles(),
        config.run_duration_secs
    );

    let mut handles = Vec::with_capacity(config.total_vehicles());
    for _ in 0..config.cars_per_direction {
        for direction in SPAWN_ORDER {
            if config.arrival_jitter_ms > 0 {
                let pause = rand::rng().random_range(0..=config.arrival_jitter_ms);
                sleep(Duration::from_millis(pause)).await;
            }
            handles.push(spawn_vehicle(junction, direction));
        }
    }

    let mut summary = SimulationSummary {
        spawned: handles.len(),
        ..SimulationSummary::default()
    };
    let mut total_wait = Duration::ZERO;
    let mut max_wait = Duration::ZERO;
    let mut per_direction: BTreeMap<String, usize> = BTreeMap::new();
    let mut tally = |outcome: Result<CrossingRecord, JoinError>, summary: &mut SimulationSummary| {
        match outcome {
            Ok(record) => {
                summary.completed += 1;
                total_wait += record.queue_wait;
                max_wait = max_wait.max(record.queue_wait);
                *per_direction
                    .entry(record.vehicle.direction.to_string())
                    .or_default() += 1;
            }
            Err(e) if e.is_cancelled() => summary.abandoned += 1,
            Err(e) => {
                // A panicking vehicle means a broken invariant.
                log::error!("Vehicle task failed: {}", e);
                std::panic::resume_unwind(e.into_panic());
            }
        }
    };

    let mut pending = handles.into_iter();
    while let Some(mut handle) = pending.next() {
        match timeout_at(deadline, &mut handle).await {
            Ok(outcome) => tally(outcome, &mut summary),
            Err(_) => {
                let rest: Vec<_> = std::iter::once(handle).chain(pending.by_ref()).collect();
                for h in &rest {
                    h.abort();
                }
                // Vehicles that retired before the abort still report a record.
                for h in rest {
                    tally(h.await, &mut summary);
                }
                log::warn!(
                    "Run limit reached, abandoned {} vehicles ({} still queued at the junction)",
                    summary.abandoned,
                    junction.waiting()
                );
                break;
            }
        }
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    if summary.completed > 0 {
        summary.mean_queue_wait_us = (total_wait.as_micros() / summary.completed as u128) as u64;
    }
    summary.max_queue_wait_us = max_wait.as_micros() as u64;
    summary.per_direction = per_direction;

    log::info!(
        "Simulation ended: {} crossed, {} abandoned in {} ms",
        summary.completed,
        summary.abandoned,
        summary.elapsed_ms
    );
    summary
}
