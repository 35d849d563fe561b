use lazy_static::lazy_static;
use prometheus::{register_counter, register_histogram, Counter, Histogram, HistogramOpts, Opts};

// Define metrics
lazy_static! {
    pub static ref REMINDERS_FIRED: Counter = register_counter!(Opts::new(
        "reminders_fired_total",
        "Total number of reservation reminders fired"
    ))
    .unwrap();

    pub static ref RESERVATION_FETCH_FAILURES: Counter = register_counter!(Opts::new(
        "reservation_fetch_failures_total",
        "Total number of skipped reminder cycles due to failed reservation lookups"
    ))
    .unwrap();

    pub static ref MEMBERSHIP_SYNC_FAILURES: Counter = register_counter!(Opts::new(
        "membership_sync_failures_total",
        "Total number of failed remote membership notification writes"
    ))
    .unwrap();

    pub static ref DISPLAY_MESSAGES: Counter = register_counter!(Opts::new(
        "display_messages_total",
        "Total number of messages handed to the display sink"
    ))
    .unwrap();

    // Timing metrics
    pub static ref REMINDER_CYCLE_TIME: Histogram = register_histogram!(
        HistogramOpts::new(
            "reminder_cycle_time_seconds",
            "Time taken to run one reminder poll cycle"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .unwrap();
}

// Text dump of every registered metric, logged at shutdown
pub fn metrics_snapshot() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return format!("Error encoding metrics: {}", e);
    }

    match String::from_utf8(buffer) {
        Ok(metrics) => metrics,
        Err(e) => format!("Error converting metrics to string: {}", e),
    }
}
