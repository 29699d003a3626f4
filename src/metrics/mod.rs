//! Thin Prometheus counter surface.
//!
//! The specification treats metric sinks as an external collaborator
//! ("specified only by interface"); this module stops at exposing a
//! handful of counters/histograms that the orchestrator and dispatcher
//! increment, without wiring an exporter or push gateway. A real
//! deployment would pair this with `prometheus::Encoder` behind an
//! admin-only `/metrics` route, which is left to the host integration.

use prometheus::{CounterVec, HistogramVec, Opts, Registry};

/// Proxy-wide metrics registry and named instruments.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub cache_lookups: CounterVec,
    pub dispatch_outcomes: CounterVec,
    pub chunk_io: CounterVec,
    pub producer_latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let cache_lookups = CounterVec::new(
            Opts::new("cache_lookups_total", "Cache lookups by tier and outcome"),
            &["tier", "outcome"],
        )
        .expect("valid metric opts");

        let dispatch_outcomes = CounterVec::new(
            Opts::new(
                "dispatch_outcomes_total",
                "Transformation dispatch outcomes by class",
            ),
            &["outcome"],
        )
        .expect("valid metric opts");

        let chunk_io = CounterVec::new(
            Opts::new("chunk_io_total", "KV chunk store reads/writes by outcome"),
            &["operation", "outcome"],
        )
        .expect("valid metric opts");

        let producer_latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "producer_latency_seconds",
                "Latency of producer invocations on cache miss",
            ),
            &["component"],
        )
        .expect("valid metric opts");

        for c in [&cache_lookups, &dispatch_outcomes, &chunk_io] {
            registry
                .register(Box::new(c.clone()))
                .expect("unique metric name");
        }
        registry
            .register(Box::new(producer_latency.clone()))
            .expect("unique metric name");

        Self {
            registry,
            cache_lookups,
            dispatch_outcomes,
            chunk_io,
            producer_latency,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("encode metrics");
        String::from_utf8(buf).expect("utf8 metrics output")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently_by_label() {
        let m = Metrics::new();
        m.cache_lookups.with_label_values(&["edge", "hit"]).inc();
        m.cache_lookups.with_label_values(&["kv", "miss"]).inc();

        let text = m.gather_text();
        assert!(text.contains("cache_lookups_total"));
    }

    #[test]
    fn gather_text_is_valid_prometheus_exposition() {
        let m = Metrics::new();
        m.dispatch_outcomes.with_label_values(&["fallback"]).inc();
        let text = m.gather_text();
        assert!(text.contains("dispatch_outcomes_total"));
        assert!(text.contains("fallback"));
    }
}
