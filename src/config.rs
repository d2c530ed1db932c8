use crate::global_variables::{ARRIVAL_JITTER_MS, NUM_CARS_PER_DIRECTION, TIME_TO_RUN_SECS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Driver settings. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Vehicles spawned on each of the four approaches.
    pub cars_per_direction: usize,
    /// Wall-clock limit; vehicles still waiting afterwards are abandoned.
    pub run_duration_secs: u64,
    /// Upper bound of the random pause between two spawns.
    pub arrival_jitter_ms: u64,
    /// Write every crossing event to this CSV file, replacing an older trace.
    pub trace_csv: Option<PathBuf>,
    /// Log each enter/leave line at info level.
    pub log_crossings: bool,
    /// Check the recorded trace for exclusion and FIFO violations after the run.
    pub audit: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cars_per_direction: NUM_CARS_PER_DIRECTION,
            run_duration_secs: TIME_TO_RUN_SECS,
            arrival_jitter_ms: ARRIVAL_JITTER_MS,
            trace_csv: None,
            log_crossings: true,
            audit: true,
        }
    }
}

impl SimulationConfig {
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_duration_secs)
    }

    pub fn total_vehicles(&self) -> usize {
        self.cars_per_direction * 4
    }

    /// Log level used when `RUST_LOG` is unset. Crossing lines are info level.
    pub fn log_filter(&self) -> &'static str {
        if self.log_crossings {
            "info"
        } else {
            "warn"
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Builds a config from command-line flags (program name excluded).
    ///
    /// `--config <file>` is applied first, the remaining flags override it.
    pub fn from_args<I>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut pairs: Vec<(String, Option<String>)> = Vec::new();
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--quiet" | "--no-audit" => pairs.push((flag, None)),
                "--config" | "--cars" | "--seconds" | "--jitter-ms" | "--trace" => {
                    let value = args
                        .next()
                        .ok_or_else(|| format!("{} expects a value", flag))?;
                    pairs.push((flag, Some(value)));
                }
                other => return Err(format!("unknown argument: {}", other).into()),
            }
        }

        let mut config = match pairs.iter().rev().find(|(flag, _)| flag == "--config") {
            Some((_, Some(path))) => Self::from_json_file(path)?,
            _ => Self::default(),
        };

        for (flag, value) in pairs {
            let value = value.unwrap_or_default();
            match flag.as_str() {
                "--cars" => config.cars_per_direction = parse_count(&flag, &value)?,
                "--seconds" => config.run_duration_secs = parse_count(&flag, &value)?,
                "--jitter-ms" => config.arrival_jitter_ms = parse_count(&flag, &value)?,
                "--trace" => config.trace_csv = Some(PathBuf::from(value)),
                "--quiet" => config.log_crossings = false,
                "--no-audit" => config.audit = false,
                _ => {}
            }
        }
        Ok(config)
    }
}

fn parse_count<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, Box<dyn Error>> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{} expects a non-negative integer, got {:?}", flag, value).into())
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--config file.json] [--cars N] [--seconds S] [--jitter-ms J] [--trace file.csv] [--quiet] [--no-audit]\n\
         Defaults: cars={NUM_CARS_PER_DIRECTION} per direction, seconds={TIME_TO_RUN_SECS}, jitter-ms={ARRIVAL_JITTER_MS}\n\
         Crossings are logged at info level (warn with --quiet); RUST_LOG overrides, e.g. RUST_LOG=debug"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_the_classic_run() {
        let config = SimulationConfig::from_args(Vec::new()).expect("empty args");
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.cars_per_direction, 500);
        assert_eq!(config.total_vehicles(), 2000);
        assert_eq!(config.run_duration(), Duration::from_secs(60));
    }

    #[test]
    fn flags_override_defaults() {
        let config = SimulationConfig::from_args(args(&[
            "--cars", "12", "--seconds", "3", "--jitter-ms", "5", "--trace", "out.csv", "--quiet",
        ]))
        .expect("valid flags");
        assert_eq!(config.cars_per_direction, 12);
        assert_eq!(config.run_duration_secs, 3);
        assert_eq!(config.arrival_jitter_ms, 5);
        assert_eq!(config.trace_csv, Some(PathBuf::from("out.csv")));
        assert!(!config.log_crossings);
        assert!(config.audit);
    }

    #[test]
    fn quiet_lowers_the_default_log_level() {
        assert_eq!(SimulationConfig::default().log_filter(), "info");
        let quiet = SimulationConfig::from_args(args(&["--quiet"])).expect("valid flags");
        assert_eq!(quiet.log_filter(), "warn");
        assert!(usage("simulation_main").contains("RUST_LOG"));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let err = SimulationConfig::from_args(args(&["--cars", "-4"])).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn missing_value_and_unknown_flag_are_errors() {
        assert!(SimulationConfig::from_args(args(&["--seconds"])).is_err());
        assert!(SimulationConfig::from_args(args(&["--speed", "9"])).is_err());
    }

    #[test]
    fn json_file_is_applied_before_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "cars_per_direction": 7, "run_duration_secs": 9 }"#)
            .expect("write config");

        let config = SimulationConfig::from_args(vec![
            "--seconds".to_string(),
            "2".to_string(),
            "--config".to_string(),
            path.display().to_string(),
        ])
        .expect("valid config");
        assert_eq!(config.cars_per_direction, 7);
        assert_eq!(config.run_duration_secs, 2);
        assert_eq!(config.arrival_jitter_ms, ARRIVAL_JITTER_MS);
    }
}
