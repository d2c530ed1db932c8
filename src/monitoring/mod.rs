pub mod crossing_monitor;
