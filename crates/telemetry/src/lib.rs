//! Structured logging init, and optional OpenTelemetry wiring behind the `otel` feature.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[cfg(feature = "otel")]
pub mod blob_observer;

/// Always-on, in-process storage-accounting counters: bytes charged and
/// refunded across the process lifetime. Cheap enough to hold unconditionally;
/// the `otel` feature's [`metrics::StorageInstruments`] additionally exports
/// these to a metrics backend when enabled.
#[derive(Clone, Default)]
pub struct StorageMetrics {
    bytes_charged_total: Arc<AtomicU64>,
    bytes_refunded_total: Arc<AtomicU64>,
}

impl StorageMetrics {
    /// A fresh, zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record bytes charged against a quota.
    pub fn add_charged(&self, bytes: u64) {
        self.bytes_charged_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record bytes refunded on permanent delete.
    pub fn add_refunded(&self, bytes: u64) {
        self.bytes_refunded_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// `(bytes_charged_total, bytes_refunded_total)` so far.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (self.bytes_charged_total.load(Ordering::Relaxed), self.bytes_refunded_total.load(Ordering::Relaxed))
    }
}

/// Errors from telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// OpenTelemetry pipeline construction failed.
    #[error("otel setup failed: {0}")]
    Otel(String),
}

/// Initialize structured JSON logging with an env filter.
///
/// Controlled by `RUST_LOG`, e.g. `"info,vault_engine=debug"`. Safe to call
/// once at process startup; a second call is a no-op because the global
/// subscriber is already set.
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize an OTLP-backed tracer for `service_name` (feature `otel`).
#[cfg(feature = "otel")]
pub fn init_otel(service_name: &str) -> Result<(), TelemetryError> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace as sdktrace;
    use opentelemetry_sdk::{runtime, Resource};

    let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_owned())]);
    let _tracer_provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().http())
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::Otel(e.to_string()))?;
    Ok(())
}

#[cfg(feature = "otel")]
pub mod metrics {
    //! OTel metrics (OTLP) for storage and account-lock gauges.
    use super::TelemetryError;
    use once_cell::sync::OnceCell;
    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Histogram, Meter, Unit};

    static METRICS_INIT: OnceCell<()> = OnceCell::new();

    fn detect_service_name() -> String {
        std::env::var("OTEL_SERVICE_NAME")
            .or_else(|_| std::env::var("VAULT_SERVICE_NAME"))
            .unwrap_or_else(|_| "vault-engine".to_string())
    }

    fn init_metrics_from_env() -> Result<(), TelemetryError> {
        let _svc = detect_service_name();
        let provider = opentelemetry_otlp::new_pipeline()
            .metrics(opentelemetry_sdk::runtime::Tokio)
            .with_exporter(opentelemetry_otlp::new_exporter().http())
            .build()
            .map_err(|e| TelemetryError::Otel(e.to_string()))?;
        global::set_meter_provider(provider);
        Ok(())
    }

    /// Initialize (idempotent) the global metrics provider from env.
    fn ensure_metrics_provider() {
        let _ = METRICS_INIT.get_or_init(|| {
            let _ = init_metrics_from_env();
        });
    }

    /// A counter paired with a histogram, for "total so far" plus "per event" views.
    #[derive(Clone)]
    pub struct CounterWrap {
        counter: Counter<u64>,
        hist: Histogram<u64>,
    }

    impl CounterWrap {
        /// Add a value to both the running total and the per-event histogram.
        pub fn add(&self, val: u64) {
            self.counter.add(val, &[]);
            self.hist.record(val, &[]);
        }
    }

    /// Storage-accounting instruments: bytes charged and bytes refunded.
    #[derive(Clone)]
    pub struct StorageInstruments {
        /// Bytes charged against a user's quota on upload.
        pub bytes_charged: CounterWrap,
        /// Bytes refunded on permanent delete.
        pub bytes_refunded: CounterWrap,
    }

    /// Build the storage-accounting instrument set against the global meter provider.
    #[must_use]
    pub fn init_storage_instruments() -> StorageInstruments {
        ensure_metrics_provider();
        let meter: Meter = global::meter("vault.quota");
        let bytes_charged = CounterWrap {
            counter: meter
                .u64_counter("vault.quota.bytes_charged")
                .with_description("Total bytes charged against storage quotas")
                .with_unit(Unit::new("By"))
                .init(),
            hist: meter
                .u64_histogram("vault.quota.bytes_charged_per_upload")
                .with_description("Bytes charged per upload")
                .with_unit(Unit::new("By"))
                .init(),
        };
        let bytes_refunded = CounterWrap {
            counter: meter
                .u64_counter("vault.quota.bytes_refunded")
                .with_description("Total bytes refunded on permanent delete")
                .with_unit(Unit::new("By"))
                .init(),
            hist: meter
                .u64_histogram("vault.quota.bytes_refunded_per_delete")
                .with_description("Bytes refunded per permanent delete")
                .with_unit(Unit::new("By"))
                .init(),
        };
        StorageInstruments { bytes_charged, bytes_refunded }
    }
}
