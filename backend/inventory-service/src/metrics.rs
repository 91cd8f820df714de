use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, TextEncoder};

static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "inventory_events_total",
            "Events processed by inventory-service, by event name and outcome",
        ),
        &["event", "outcome"],
    )
    .expect("failed to create inventory_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register inventory_events_total");
    counter
});

static QUANTITY_ADJUSTMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "inventory_quantity_adjustments_total",
            "Per-item stock adjustments, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create inventory_quantity_adjustments_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register inventory_quantity_adjustments_total");
    counter
});

static THUMBNAIL_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "inventory_thumbnail_duration_seconds",
            "Fetch + resize + upload latency of thumbnail generation",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("failed to create inventory_thumbnail_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register inventory_thumbnail_duration_seconds");
    histogram
});

static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new("inventory_batch_size", "Number of events per consumed batch")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
    )
    .expect("failed to create inventory_batch_size");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register inventory_batch_size");
    histogram
});

static CONSUMER_STATE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "inventory_consumer_state",
        "Consumer loop state (0 = stopped, 1 = running, 2 = faulted)",
    )
    .expect("failed to create inventory_consumer_state");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register inventory_consumer_state");
    gauge
});

pub fn record_event(event: &str, outcome: &str) {
    EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
}

pub fn record_quantity_adjustment(outcome: &str) {
    QUANTITY_ADJUSTMENTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_thumbnail_duration(seconds: f64) {
    THUMBNAIL_DURATION_SECONDS.observe(seconds);
}

pub fn observe_batch_size(size: usize) {
    BATCH_SIZE.observe(size as f64);
}

pub fn set_consumer_state(code: i64) {
    CONSUMER_STATE.set(code);
}

/// Render the default registry in the Prometheus text format
pub fn render() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    let body = String::from_utf8_lossy(&buffer).into_owned();
    Ok((encoder.format_type().to_string(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_event("view_cart", "applied");
        record_quantity_adjustment("applied");
        set_consumer_state(1);

        let (content_type, body) = render().unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("inventory_events_total"));
        assert!(body.contains("inventory_quantity_adjustments_total"));
        assert!(body.contains("inventory_consumer_state"));
    }
}
