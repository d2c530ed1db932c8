use crossing_sim::global_variables::TRACE_CSV_FILE;
use crossing_sim::monitoring::crossing_monitor::{audit_trace, read_trace_csv};

fn main() {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| TRACE_CSV_FILE.to_string());
    println!("Auditing crossing trace {}...", path);

    let events = match read_trace_csv(&path) {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Audit error: {}", e);
            std::process::exit(2);
        }
    };

    let report = audit_trace(&events);
    print!("{}", report);
    if !report.is_clean() {
        std::process::exit(1);
    }
}
