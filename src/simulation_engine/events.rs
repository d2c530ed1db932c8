use crate::shared_data::CrossingEvent;
use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Receives crossing notifications.
///
/// Both calls happen while the intersection is held, so a vehicle's enter and
/// leave always arrive back to back. Implementations must not block for long.
pub trait CrossingObserver: Send + Sync {
    fn on_enter(&self, event: &CrossingEvent);
    fn on_leave(&self, event: &CrossingEvent);
}

/// Logs every crossing at info level, one line per event.
#[derive(Debug, Default)]
pub struct LogObserver;

impl CrossingObserver for LogObserver {
    fn on_enter(&self, event: &CrossingEvent) {
        log::info!(
            "{} car with ID ({}) entering intersection.",
            event.direction,
            event.vehicle_id
        );
    }

    fn on_leave(&self, event: &CrossingEvent) {
        log::info!(
            "{} car with ID ({}) leaving intersection.",
            event.direction,
            event.vehicle_id
        );
    }
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct SilentObserver;

impl CrossingObserver for SilentObserver {
    fn on_enter(&self, _event: &CrossingEvent) {}
    fn on_leave(&self, _event: &CrossingEvent) {}
}

/// Keeps the full event trace in memory.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    events: Mutex<Vec<CrossingEvent>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the trace in emission order.
    pub fn events(&self) -> Vec<CrossingEvent> {
        self.events.lock().expect("trace mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("trace mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: &CrossingEvent) {
        self.events
            .lock()
            .expect("trace mutex poisoned")
            .push(event.clone());
    }
}

impl CrossingObserver for TraceRecorder {
    fn on_enter(&self, event: &CrossingEvent) {
        self.push(event);
    }

    fn on_leave(&self, event: &CrossingEvent) {
        self.push(event);
    }
}

/// Forwards events into an unbounded tokio channel.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<CrossingEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CrossingEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: &CrossingEvent) {
        if self.sender.send(event.clone()).is_err() {
            log::debug!("crossing event {} dropped, receiver closed", event.seq);
        }
    }
}

impl CrossingObserver for ChannelObserver {
    fn on_enter(&self, event: &CrossingEvent) {
        self.forward(event);
    }

    fn on_leave(&self, event: &CrossingEvent) {
        self.forward(event);
    }
}

/// Writes events to a CSV file with a header row.
///
/// Event `seq` numbers restart with every junction, so `create` replaces any
/// trace already at the path rather than mixing two runs in one file.
pub struct CsvTraceObserver {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvTraceObserver {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let file = File::create(path.as_ref())?;
        let writer = csv::WriterBuilder::new().has_headers(true).from_writer(file);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn flush(&self) -> Result<(), Box<dyn Error>> {
        self.writer.lock().expect("csv writer mutex poisoned").flush()?;
        Ok(())
    }

    fn write(&self, event: &CrossingEvent) {
        let mut writer = self.writer.lock().expect("csv writer mutex poisoned");
        if let Err(e) = writer.serialize(event) {
            log::warn!("Error logging crossing event {}: {}", event.seq, e);
        }
    }
}

impl CrossingObserver for CsvTraceObserver {
    fn on_enter(&self, event: &CrossingEvent) {
        self.write(event);
    }

    fn on_leave(&self, event: &CrossingEvent) {
        self.write(event);
    }
}

/// Hands each event to several observers in order.
#[derive(Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn CrossingObserver>>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn CrossingObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl CrossingObserver for FanoutObserver {
    fn on_enter(&self, event: &CrossingEvent) {
        for observer in &self.observers {
            observer.on_enter(event);
        }
    }

    fn on_leave(&self, event: &CrossingEvent) {
        for observer in &self.observers {
            observer.on_leave(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::EventKind;
    use crate::simulation_engine::vehicles::{Direction, VehicleId};

    fn event(seq: u64, kind: EventKind) -> CrossingEvent {
        CrossingEvent {
            seq,
            kind,
            direction: Direction::West,
            vehicle_id: VehicleId(9),
            queue_position: 0,
            timestamp_micros: 1_000 + seq,
        }
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let first = Arc::new(TraceRecorder::new());
        let second = Arc::new(TraceRecorder::new());
        let fanout = FanoutObserver::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(SilentObserver));

        fanout.on_enter(&event(0, EventKind::Enter));
        fanout.on_leave(&event(1, EventKind::Leave));

        assert_eq!(first.events(), second.events());
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn channel_observer_forwards_in_order() {
        let (observer, mut receiver) = ChannelObserver::new();
        observer.on_enter(&event(0, EventKind::Enter));
        observer.on_leave(&event(1, EventKind::Leave));
        drop(observer);

        let mut seqs = Vec::new();
        while let Some(event) = receiver.recv().await {
            seqs.push(event.seq);
        }
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (observer, receiver) = ChannelObserver::new();
        drop(receiver);
        observer.on_enter(&event(0, EventKind::Enter));
    }

    #[test]
    fn csv_trace_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trace.csv");

        let observer = CsvTraceObserver::create(&path).expect("create trace");
        observer.on_enter(&event(0, EventKind::Enter));
        observer.on_leave(&event(1, EventKind::Leave));
        observer.flush().expect("flush trace");

        let mut reader = csv::Reader::from_path(&path).expect("open trace");
        let rows: Vec<CrossingEvent> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .expect("parse trace");
        assert_eq!(rows, vec![event(0, EventKind::Enter), event(1, EventKind::Leave)]);
    }

    #[test]
    fn csv_trace_replaces_an_earlier_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trace.csv");

        let first = CsvTraceObserver::create(&path).expect("create trace");
        first.on_enter(&event(0, EventKind::Enter));
        first.on_leave(&event(1, EventKind::Leave));
        first.flush().expect("flush trace");
        drop(first);

        let second = CsvTraceObserver::create(&path).expect("recreate trace");
        second.on_enter(&event(0, EventKind::Enter));
        second.flush().expect("flush trace");

        let mut reader = csv::Reader::from_path(&path).expect("open trace");
        let rows: Vec<CrossingEvent> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .expect("parse trace");
        assert_eq!(rows, vec![event(0, EventKind::Enter)]);
    }
}
