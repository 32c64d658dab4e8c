use lazy_static::lazy_static;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::Opts;
use prometheus::Registry;
use slog::debug;
use slog::Logger;

lazy_static! {
    pub static ref ZOO_CONNECT_COUNT: Counter = Counter::new(
        "zkgate_connect",
        "Number of sessions opened against the zookeeper ensemble since the process started"
    )
    .expect("Failed to create ZOO_CONNECT_COUNT counter");
    pub static ref ZOO_OP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "zkgate_op_duration",
            "Duration (in seconds) of zookeeper operations"
        ),
        &["operation"]
    )
    .expect("Failed to create ZOO_OP_DURATION histogram");
    pub static ref ZOO_OP_ERRORS_COUNT: CounterVec = CounterVec::new(
        Opts::new("zkgate_op_errors", "Number of zookeeper operations that failed"),
        &["operation"]
    )
    .expect("Failed to create ZOO_OP_ERRORS_COUNT counter");
    pub static ref ZOO_TIMEOUTS_COUNT: Counter = Counter::new(
        "zkgate_timeouts",
        "Number of operations that failed due to timeouts"
    )
    .expect("Failed to create ZOO_TIMEOUTS_COUNT counter");
    pub static ref ZOO_WATCH_EVENTS_COUNT: CounterVec = CounterVec::new(
        Opts::new(
            "zkgate_watch_events",
            "Number of watch events delivered to the session relay"
        ),
        &["kind"]
    )
    .expect("Failed to create ZOO_WATCH_EVENTS_COUNT counter");
}

/// Attempts to register metrics with the Registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(ZOO_CONNECT_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_CONNECT_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_OP_DURATION.clone())) {
        debug!(logger, "Failed to register ZOO_OP_DURATION"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_OP_ERRORS_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_OP_ERRORS_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_TIMEOUTS_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_TIMEOUTS_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_WATCH_EVENTS_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_WATCH_EVENTS_COUNT"; "error" => ?err);
    }
}
