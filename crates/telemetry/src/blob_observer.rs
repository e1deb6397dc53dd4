//! OTel-backed observer for blob store metrics (feature-gated via `otel`).
//! Provides counters for put/get bytes and remove count; spans are best-effort.

use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, Unit};
use opentelemetry::KeyValue;
use std::sync::atomic::{AtomicU64, Ordering};

use ::blob_store::{BlobSpan, BlobStoreObserver};

struct Instruments {
    put_bytes: Counter<u64>,
    get_bytes: Counter<u64>,
    remove_count: Counter<u64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();
static INSTANCE: OnceCell<OtelBlobObserver> = OnceCell::new();

// Test-visible mirrors so unit tests can assert increments without exporter plumbing.
static PUT_ACC: AtomicU64 = AtomicU64::new(0);
static GET_ACC: AtomicU64 = AtomicU64::new(0);
static REMOVE_ACC: AtomicU64 = AtomicU64::new(0);

fn ensure_instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        let meter: Meter = global::meter("vault.blob");
        let put_bytes = meter
            .u64_counter("blob.put.bytes")
            .with_description("Plaintext bytes accepted by stage()/replace_contents()")
            .with_unit(Unit::new("By"))
            .init();
        let get_bytes = meter
            .u64_counter("blob.get.bytes")
            .with_description("Plaintext bytes returned by open_for_read()")
            .with_unit(Unit::new("By"))
            .init();
        let remove_count = meter
            .u64_counter("blob.remove.count")
            .with_description("Number of blobs permanently removed")
            .init();
        Instruments { put_bytes, get_bytes, remove_count }
    })
}

/// A [`BlobStoreObserver`] that forwards counts to OpenTelemetry metrics and
/// wraps operations in a `tracing` span.
#[derive(Clone, Copy)]
pub struct OtelBlobObserver;

impl BlobStoreObserver for OtelBlobObserver {
    fn put_bytes(&self, n: u64) {
        if n > 0 {
            let inst = ensure_instruments();
            inst.put_bytes.add(n, &[KeyValue::new("op", "put")]);
            let _ = PUT_ACC.fetch_add(n, Ordering::Relaxed);
        }
    }
    fn get_bytes(&self, n: u64) {
        if n > 0 {
            let inst = ensure_instruments();
            inst.get_bytes.add(n, &[KeyValue::new("op", "get")]);
            let _ = GET_ACC.fetch_add(n, Ordering::Relaxed);
        }
    }
    fn remove_count(&self, n: u64) {
        if n > 0 {
            let inst = ensure_instruments();
            inst.remove_count.add(n, &[KeyValue::new("op", "remove")]);
            let _ = REMOVE_ACC.fetch_add(n, Ordering::Relaxed);
        }
    }
    fn span(&self, name: &'static str) -> BlobSpan {
        let span = tracing::span!(tracing::Level::INFO, "blob", op = name);
        let entered = span.entered();
        ::blob_store::BlobSpan::from_guard(entered)
    }
}

/// A global `&'static` instance suitable for `blob_store::set_observer()`.
pub fn global() -> &'static OtelBlobObserver {
    INSTANCE.get_or_init(|| {
        let _ = ensure_instruments();
        OtelBlobObserver
    })
}

/// Snapshot the test-visible counter mirrors, for integration tests.
#[must_use]
pub fn snapshot_counters() -> (u64, u64, u64) {
    (PUT_ACC.load(Ordering::Relaxed), GET_ACC.load(Ordering::Relaxed), REMOVE_ACC.load(Ordering::Relaxed))
}
