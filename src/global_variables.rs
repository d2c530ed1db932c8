// Default run shape: 500 cars per direction, 2000 tasks in total.
pub const NUM_CARS_PER_DIRECTION: usize = 500;
pub const TIME_TO_RUN_SECS: u64 = 60;

// Random delay between spawns, 0 spawns everything back to back.
pub const ARRIVAL_JITTER_MS: u64 = 0;

// Trace file used by the audit binary when none is given.
pub const TRACE_CSV_FILE: &str = "crossings.csv";
