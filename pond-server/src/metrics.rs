//! Prometheus counters/gauges for the ingest and query paths, scraped by
//! whatever external process runs alongside this one.

use std::sync::LazyLock;

use bytes::{BufMut, Bytes, BytesMut};
use prometheus::{Encoder, Histogram, IntCounter, IntGauge, TextEncoder, register_histogram, register_int_counter, register_int_gauge};

pub fn received() -> &'static IntCounter {
    static COUNTER: LazyLock<IntCounter> =
        LazyLock::new(|| register_int_counter!("pond_datagrams_received_total", "UDP datagrams received").unwrap());
    &COUNTER
}

pub fn malformed() -> &'static IntCounter {
    static COUNTER: LazyLock<IntCounter> =
        LazyLock::new(|| register_int_counter!("pond_datagrams_malformed_total", "UDP datagrams dropped for failing to parse").unwrap());
    &COUNTER
}

pub fn discarded() -> &'static IntCounter {
    static COUNTER: LazyLock<IntCounter> =
        LazyLock::new(|| register_int_counter!("pond_datagrams_discarded_total", "UDP datagrams dropped by the per-site rate limiter").unwrap());
    &COUNTER
}

pub fn memory_usage_bytes() -> &'static IntGauge {
    static GAUGE: LazyLock<IntGauge> =
        LazyLock::new(|| register_int_gauge!("pond_memory_usage_bytes", "Bytes currently held in the record arena").unwrap());
    &GAUGE
}

pub fn record_count() -> &'static IntGauge {
    static GAUGE: LazyLock<IntGauge> = LazyLock::new(|| register_int_gauge!("pond_record_count", "Records currently held").unwrap());
    &GAUGE
}

pub fn observe_query_batch_size(n: usize) {
    static HISTOGRAM: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "pond_query_batch_records",
            "LOG_RECORD frames sent per write-loop batch",
            vec![1.0, 4.0, 16.0, 64.0, 256.0]
        )
        .unwrap()
    });
    HISTOGRAM.observe(n as f64);
}

pub fn gather() -> Bytes {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = BytesMut::new().writer();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    buffer.into_inner().freeze()
}
