use crate::shared_data::{CrossingEvent, EventKind};
use crate::simulation_engine::vehicles::{Direction, VehicleId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// A broken crossing rule found in a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    /// A vehicle entered while another one was still inside.
    Overlap {
        seq: u64,
        entering: VehicleId,
        inside: VehicleId,
    },
    /// A leave that does not match the vehicle inside.
    UnmatchedLeave {
        seq: u64,
        vehicle: VehicleId,
        inside: Option<VehicleId>,
    },
    /// A direction crossed out of join order: a position at or below one
    /// that already crossed.
    FifoOrder {
        seq: u64,
        direction: Direction,
        expected_position: u64,
        found_position: u64,
    },
    /// The same id crossed twice.
    DuplicateId { seq: u64, vehicle: VehicleId },
    /// The trace ends with a vehicle still inside.
    OpenCrossing { vehicle: VehicleId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Overlap {
                seq,
                entering,
                inside,
            } => write!(f, "#{seq}: car {entering} entered while car {inside} was inside"),
            Violation::UnmatchedLeave {
                seq,
                vehicle,
                inside,
            } => match inside {
                Some(inside) => write!(f, "#{seq}: car {vehicle} left while car {inside} was inside"),
                None => write!(f, "#{seq}: car {vehicle} left an empty intersection"),
            },
            Violation::FifoOrder {
                seq,
                direction,
                expected_position,
                found_position,
            } => write!(
                f,
                "#{seq}: {direction} crossed queue position {found_position}, expected {expected_position} or later"
            ),
            Violation::DuplicateId { seq, vehicle } => {
                write!(f, "#{seq}: car {vehicle} crossed more than once")
            }
            Violation::OpenCrossing { vehicle } => {
                write!(f, "trace ends with car {vehicle} inside the intersection")
            }
        }
    }
}

/// Result of checking a crossing trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub events: usize,
    pub crossings: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "events={} crossings={} violations={}",
            self.events,
            self.crossings,
            self.violations.len()
        )?;
        for violation in &self.violations {
            writeln!(f, "  {violation}")?;
        }
        Ok(())
    }
}

/// Checks mutual exclusion, per-direction FIFO and id uniqueness.
///
/// Events are taken in `seq` order. Queue positions of each direction must
/// cross in increasing order; gaps are allowed, since a vehicle dropped from its
/// queue never crosses. No order between directions is assumed.
pub fn audit_trace(events: &[CrossingEvent]) -> AuditReport {
    let mut ordered: Vec<&CrossingEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.seq);

    let mut report = AuditReport {
        events: events.len(),
        ..AuditReport::default()
    };
    let mut inside: Option<&CrossingEvent> = None;
    let mut next_position: HashMap<Direction, u64> = HashMap::new();
    let mut crossed: HashSet<VehicleId> = HashSet::new();

    for event in ordered {
        match event.kind {
            EventKind::Enter => {
                if let Some(current) = inside {
                    report.violations.push(Violation::Overlap {
                        seq: event.seq,
                        entering: event.vehicle_id,
                        inside: current.vehicle_id,
                    });
                }
                if !crossed.insert(event.vehicle_id) {
                    report.violations.push(Violation::DuplicateId {
                        seq: event.seq,
                        vehicle: event.vehicle_id,
                    });
                }
                let expected = next_position.entry(event.direction).or_insert(0);
                if event.queue_position < *expected {
                    report.violations.push(Violation::FifoOrder {
                        seq: event.seq,
                        direction: event.direction,
                        expected_position: *expected,
                        found_position: event.queue_position,
                    });
                }
                *expected = (*expected).max(event.queue_position + 1);
                inside = Some(event);
            }
            EventKind::Leave => match inside {
                Some(current) if current.vehicle_id == event.vehicle_id => {
                    report.crossings += 1;
                    inside = None;
                }
                other => {
                    report.violations.push(Violation::UnmatchedLeave {
                        seq: event.seq,
                        vehicle: event.vehicle_id,
                        inside: other.map(|e| e.vehicle_id),
                    });
                }
            },
        }
    }

    if let Some(current) = inside {
        report.violations.push(Violation::OpenCrossing {
            vehicle: current.vehicle_id,
        });
    }
    report
}

/// Loads a trace written by `CsvTraceObserver`.
pub fn read_trace_csv<P: AsRef<Path>>(path: P) -> Result<Vec<CrossingEvent>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut events = Vec::new();
    for row in reader.deserialize() {
        let event: CrossingEvent = row?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(seq: u64, kind: EventKind, direction: Direction, id: u64, position: u64) -> CrossingEvent {
        CrossingEvent {
            seq,
            kind,
            direction,
            vehicle_id: VehicleId(id),
            queue_position: position,
            timestamp_micros: seq,
        }
    }

    fn crossing(seq: u64, direction: Direction, id: u64, position: u64) -> [CrossingEvent; 2] {
        [
            ev(seq, EventKind::Enter, direction, id, position),
            ev(seq + 1, EventKind::Leave, direction, id, position),
        ]
    }

    #[test]
    fn clean_trace_passes() {
        let mut events = Vec::new();
        events.extend(crossing(0, Direction::South, 0, 0));
        events.extend(crossing(2, Direction::East, 3, 0));
        events.extend(crossing(4, Direction::South, 1, 1));
        events.extend(crossing(6, Direction::South, 2, 2));

        let report = audit_trace(&events);
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.crossings, 4);
        assert_eq!(report.events, 8);
    }

    #[test]
    fn split_pair_is_an_overlap() {
        let events = vec![
            ev(0, EventKind::Enter, Direction::South, 0, 0),
            ev(1, EventKind::Enter, Direction::North, 1, 0),
            ev(2, EventKind::Leave, Direction::South, 0, 0),
            ev(3, EventKind::Leave, Direction::North, 1, 0),
        ];
        let report = audit_trace(&events);
        assert!(report.violations.contains(&Violation::Overlap {
            seq: 1,
            entering: VehicleId(1),
            inside: VehicleId(0),
        }));
        assert!(!report.is_clean());
    }

    #[test]
    fn out_of_order_direction_is_flagged() {
        let mut events = Vec::new();
        events.extend(crossing(0, Direction::West, 5, 1));
        events.extend(crossing(2, Direction::West, 4, 0));
        let report = audit_trace(&events);
        assert_eq!(
            report.violations,
            vec![Violation::FifoOrder {
                seq: 2,
                direction: Direction::West,
                expected_position: 2,
                found_position: 0,
            }]
        );
    }

    #[test]
    fn positions_of_dropped_vehicles_may_be_skipped() {
        let mut events = Vec::new();
        events.extend(crossing(0, Direction::North, 0, 0));
        events.extend(crossing(2, Direction::North, 2, 2));
        events.extend(crossing(4, Direction::North, 5, 5));
        let report = audit_trace(&events);
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.crossings, 3);
    }

    #[test]
    fn duplicate_and_open_crossings_are_flagged() {
        let mut events = Vec::new();
        events.extend(crossing(0, Direction::North, 7, 0));
        events.push(ev(2, EventKind::Enter, Direction::North, 7, 1));
        let report = audit_trace(&events);
        assert!(report.violations.contains(&Violation::DuplicateId {
            seq: 2,
            vehicle: VehicleId(7),
        }));
        assert!(report.violations.contains(&Violation::OpenCrossing {
            vehicle: VehicleId(7),
        }));
    }

    #[test]
    fn events_are_audited_in_seq_order() {
        let mut events = Vec::new();
        events.extend(crossing(2, Direction::East, 1, 1));
        events.extend(crossing(0, Direction::East, 0, 0));
        assert!(audit_trace(&events).is_clean());
    }

    #[test]
    fn stray_leave_is_flagged() {
        let events = vec![ev(0, EventKind::Leave, Direction::South, 3, 0)];
        let report = audit_trace(&events);
        assert_eq!(report.to_string().lines().count(), 2);
        assert_eq!(
            report.violations,
            vec![Violation::UnmatchedLeave {
                seq: 0,
                vehicle: VehicleId(3),
                inside: None,
            }]
        );
    }
}
