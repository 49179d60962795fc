use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::{Arc, OnceLock};
use tracing::info;

// Declare the static OnceLock to hold the Metrics.
static METRICS_INSTANCE: OnceLock<Arc<Metrics>> = OnceLock::new();

/// Initializes on first use and returns the process-wide `Metrics`.
///
/// Synchronous on purpose: consumer drop and watchdog firing record metrics
/// outside of an async context.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| {
        info!("Initializing Metrics ...");
        Metrics::new()
    })
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Source metrics
    pub source_invocations: IntCounter,
    pub source_failures: IntCounterVec,
    pub fetch_duration: HistogramVec,
    pub fetch_outcomes: IntCounterVec,

    // Cache metrics
    pub cache_hits: IntCounter,
    pub token_expiry_unix: IntGauge,
    pub watchdog_fires: IntCounter,
    pub logouts: IntCounter,

    // Distribution metrics
    pub active_consumers: IntGauge,
    pub pipeline_generations: IntCounter,
    pub terminal_failures: IntCounter,

    // Sink metrics
    pub sink_propagations: IntCounter,
    pub sink_failures: IntCounter,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenprovider".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Source
            source_invocations: IntCounter::new("source_invocations_total", "Total token source invocations").unwrap(),
            source_failures: IntCounterVec::new(Opts::new("source_failures_total", "Token source failures by phase"),&["phase"],).unwrap(),
            fetch_duration: HistogramVec::new(HistogramOpts::new("fetch_duration_seconds", "Fetch pipeline duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["outcome"],).unwrap(),
            fetch_outcomes: IntCounterVec::new(Opts::new("fetch_outcomes_total", "Fetch pipeline outcomes"),&["outcome"],).unwrap(),

            // Cache
            cache_hits: IntCounter::new("cache_hits_total", "Evaluations served from the cached token").unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry timestamp of the cached token, 0 when empty").unwrap(),
            watchdog_fires: IntCounter::new("watchdog_fires_total", "Expiry watchdog firings").unwrap(),
            logouts: IntCounter::new("logouts_total", "Cache clears caused by logout").unwrap(),

            // Distribution
            active_consumers: IntGauge::new("active_consumers", "Attached token consumers").unwrap(),
            pipeline_generations: IntCounter::new("pipeline_generations_total", "Evaluation pipelines started").unwrap(),
            terminal_failures: IntCounter::new("terminal_failures_total", "Failures surfaced to consumers").unwrap(),

            // Sink
            sink_propagations: IntCounter::new("sink_propagations_total", "Tokens written to the file sink").unwrap(),
            sink_failures: IntCounter::new("sink_failures_total", "File sink write failures").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.source_invocations.clone())).unwrap();
        reg.register(Box::new(metrics.source_failures.clone())).unwrap();
        reg.register(Box::new(metrics.fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.fetch_outcomes.clone())).unwrap();
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.watchdog_fires.clone())).unwrap();
        reg.register(Box::new(metrics.logouts.clone())).unwrap();
        reg.register(Box::new(metrics.active_consumers.clone())).unwrap();
        reg.register(Box::new(metrics.pipeline_generations.clone())).unwrap();
        reg.register(Box::new(metrics.terminal_failures.clone())).unwrap();
        reg.register(Box::new(metrics.sink_propagations.clone())).unwrap();
        reg.register(Box::new(metrics.sink_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
