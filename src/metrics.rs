//! Finder metrics (Prometheus via OpenTelemetry) and tracing span helpers.

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{FinderMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        metrics::{Counter, Histogram, MeterProvider},
        KeyValue,
    };
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};

    pub static METRICS: Lazy<FinderMetrics> = Lazy::new(FinderMetrics::init);

    pub struct FinderMetrics {
        pub registry: Registry,
        // Keeps the Prometheus reader alive
        _provider: SdkMeterProvider,
        pub finder_calls_total: Counter<u64>,
        pub documents_created_total: Counter<u64>,
        pub not_found_total: Counter<u64>,
        pub store_duration: Histogram<f64>,
    }

    impl FinderMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, finder metrics are not exported: {e}");
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("lifeguard_finders");

            let finder_calls_total = meter
                .u64_counter("lifeguard_finder_calls_total")
                .with_description("Finder calls by operation")
                .build();

            let documents_created_total = meter
                .u64_counter("lifeguard_documents_created_total")
                .with_description("Documents persisted by the create path")
                .build();

            let not_found_total = meter
                .u64_counter("lifeguard_not_found_total")
                .with_description("DocumentNotFound failures raised")
                .build();

            let store_duration = meter
                .f64_histogram("lifeguard_store_duration_seconds")
                .with_description("Duration of document store calls")
                .build();

            Self {
                registry,
                _provider: provider,
                finder_calls_total,
                documents_created_total,
                not_found_total,
                store_duration,
            }
        }

        pub fn record_finder_call(&self, operation: &'static str, collection: &'static str) {
            self.finder_calls_total.add(
                1,
                &[
                    KeyValue::new("operation", operation),
                    KeyValue::new("collection", collection),
                ],
            );
        }

        pub fn record_document_created(&self, collection: &'static str) {
            self.documents_created_total
                .add(1, &[KeyValue::new("collection", collection)]);
        }

        pub fn record_not_found(&self, collection: &'static str) {
            self.not_found_total
                .add(1, &[KeyValue::new("collection", collection)]);
        }

        /// One sample per store operation (a criteria execution), whatever
        /// number of statements the backend runs for it
        pub fn record_store_duration(&self, collection: &str, elapsed: std::time::Duration) {
            self.store_duration.record(
                elapsed.as_secs_f64(),
                &[KeyValue::new("collection", collection.to_string())],
            );
        }

        /// Prometheus text exposition of everything recorded so far
        pub fn render(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("failed to encode finder metrics: {e}");
            }
            String::from_utf8(buffer).unwrap_or_default()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span around one facade call (`find_by`, `find_or_create_by`, ...)
    pub fn finder_span(operation: &'static str, collection: &'static str) -> Span {
        tracing::debug_span!("lifeguard.finder", operation, collection)
    }

    /// Span around one store round trip
    pub fn store_span(operation: &'static str, collection: &str) -> Span {
        tracing::trace_span!("lifeguard.store", operation, collection)
    }
}
