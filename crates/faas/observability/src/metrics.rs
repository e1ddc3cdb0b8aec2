//! Prometheus invocation metrics

use crate::error::Result;
use faas_types::{InvocationContext, InvocationObserver, InvocationOutcome};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Observer recording invocation counts, concurrency and latency
pub struct InvocationMetrics {
    /// Finished invocations by action, invoker and outcome
    pub invocations_total: IntCounterVec,

    /// Invocations between `initialize` and `update`, per invoker
    pub invocations_in_flight: IntGaugeVec,

    /// Callable wall time
    pub invocation_duration_seconds: HistogramVec,
}

impl InvocationMetrics {
    /// Create and register invocation metrics
    pub fn new(registry: &Registry) -> Self {
        let invocations_total = IntCounterVec::new(
            Opts::new("faas_invocations_total", "Finished invocations"),
            &["action", "invoker", "outcome"],
        )
        .expect("Failed to create invocations_total metric");
        registry
            .register(Box::new(invocations_total.clone()))
            .expect("Failed to register invocations_total");

        let invocations_in_flight = IntGaugeVec::new(
            Opts::new("faas_invocations_in_flight", "Invocations in flight"),
            &["invoker"],
        )
        .expect("Failed to create invocations_in_flight metric");
        registry
            .register(Box::new(invocations_in_flight.clone()))
            .expect("Failed to register invocations_in_flight");

        let invocation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "faas_invocation_duration_seconds",
                "Invocation duration",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["action"],
        )
        .expect("Failed to create invocation_duration_seconds metric");
        registry
            .register(Box::new(invocation_duration_seconds.clone()))
            .expect("Failed to register invocation_duration_seconds");

        Self {
            invocations_total,
            invocations_in_flight,
            invocation_duration_seconds,
        }
    }

    pub fn finished(&self, action: &str, invoker: &str, outcome: &str) -> u64 {
        self.invocations_total
            .with_label_values(&[action, invoker, outcome])
            .get()
    }

    pub fn in_flight(&self, invoker: &str) -> i64 {
        self.invocations_in_flight
            .with_label_values(&[invoker])
            .get()
    }
}

impl InvocationObserver for InvocationMetrics {
    fn initialize(&self, ctx: &InvocationContext) {
        self.invocations_in_flight
            .with_label_values(&[ctx.invoker_id.as_str()])
            .inc();
    }

    fn update(&self, ctx: &InvocationContext, outcome: &InvocationOutcome) {
        let invoker = ctx.invoker_id.as_str();
        let label = if outcome.success { "success" } else { "failure" };
        self.invocations_in_flight
            .with_label_values(&[invoker])
            .dec();
        self.invocations_total
            .with_label_values(&[ctx.action_id.as_str(), invoker, label])
            .inc();
        self.invocation_duration_seconds
            .with_label_values(&[ctx.action_id.as_str()])
            .observe(outcome.duration.as_secs_f64());
    }
}

/// Export metrics in Prometheus text format
pub fn export_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
