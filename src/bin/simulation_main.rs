// simulation_main.rs
use crossing_sim::config::{usage, SimulationConfig};
use crossing_sim::monitoring::crossing_monitor::audit_trace;
use crossing_sim::run_simulation;
use crossing_sim::simulation_engine::events::{
    CrossingObserver, CsvTraceObserver, FanoutObserver, LogObserver, TraceRecorder,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "simulation_main".to_string());
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", usage(&program));
        return;
    }
    let config = match SimulationConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", usage(&program));
            std::process::exit(2);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .init();

    let recorder = Arc::new(TraceRecorder::new());
    let mut observer = FanoutObserver::new();
    if config.audit {
        observer = observer.with(recorder.clone());
    }
    if config.log_crossings {
        observer = observer.with(Arc::new(LogObserver));
    }
    let csv_trace = match &config.trace_csv {
        Some(path) => match CsvTraceObserver::create(path) {
            Ok(csv) => {
                let csv = Arc::new(csv);
                observer = observer.with(csv.clone());
                Some(csv)
            }
            Err(e) => {
                eprintln!("Cannot open trace file {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => None,
    };
    let observer: Arc<dyn CrossingObserver> = Arc::new(observer);

    let summary = run_simulation(&config, observer).await;

    if let Some(csv) = csv_trace {
        if let Err(e) = csv.flush() {
            log::warn!("Error flushing crossing trace: {}", e);
        }
    }

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("ERROR serializing summary: {}", e),
    }

    if config.audit {
        let report = audit_trace(&recorder.events());
        print!("{}", report);
        if !report.is_clean() {
            std::process::exit(1);
        }
    }
    println!("Exiting...");
}
