use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;

/// Engine calls range from one warm image to whole folders.
const INVOCATION_BUCKETS_MS: [f64; 12] = [
    25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0, 60_000.0,
    300_000.0,
];

pub struct Metrics {
    request_counter: Counter<u64>,
    invocation_duration: Histogram<u64>,
    skipped_frames: Counter<u64>,
    malformed_detections: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        // TODO: opentelemetry-prometheus is deprecated, export through opentelemetry-otlp instead
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("detection_service");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of detection requests")
            .build();

        let invocation_duration = meter
            .u64_histogram("invocation_duration_ms")
            .with_boundaries(INVOCATION_BUCKETS_MS.to_vec())
            .with_description("Duration of detection engine invocations in milliseconds")
            .build();

        let skipped_frames = meter
            .u64_counter("skipped_frames_total")
            .with_description("Images dropped from a response because their record was unusable")
            .build();

        let malformed_detections = meter
            .u64_counter("malformed_detections_total")
            .with_description("Detection records missing required keys")
            .build();

        Ok(Metrics {
            request_counter,
            invocation_duration,
            skipped_frames,
            malformed_detections,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_invocation_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.invocation_duration.record(duration_ms, &attributes);
    }

    pub fn record_skipped_frames(&self, count: usize, route: &str) {
        if count == 0 {
            return;
        }
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.skipped_frames.add(count as u64, &attributes);
    }

    pub fn record_malformed_detections(&self, count: usize, route: &str) {
        if count == 0 {
            return;
        }
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.malformed_detections.add(count as u64, &attributes);
    }
}
