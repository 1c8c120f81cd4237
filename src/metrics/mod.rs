//! Prometheus metrics for the notification service.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "courier";

lazy_static! {
    /// Jobs accepted and enqueued, by channel
    pub static ref JOBS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_enqueued_total", METRIC_PREFIX),
        "Total notification jobs enqueued",
        &["channel"]
    ).unwrap();

    /// Deliveries acked as sent, by channel
    pub static ref JOBS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_sent_total", METRIC_PREFIX),
        "Total notification jobs delivered successfully",
        &["channel"]
    ).unwrap();

    /// Terminal delivery failures, by channel
    pub static ref JOBS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_failed_total", METRIC_PREFIX),
        "Total notification jobs terminally failed",
        &["channel"]
    ).unwrap();

    /// Webhook retries scheduled via deferred re-enqueue
    pub static ref JOB_RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_job_retries_total", METRIC_PREFIX),
        "Total delivery retries scheduled"
    ).unwrap();

    /// Rejected submissions (validation failures)
    pub static ref SUBMISSIONS_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_submissions_rejected_total", METRIC_PREFIX),
        "Total submissions rejected by validation"
    ).unwrap();

    /// Adapter send duration, by channel
    pub static ref SEND_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_send_duration_seconds", METRIC_PREFIX),
        "Adapter send duration in seconds",
        &["channel"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    /// Queue depth gauges, refreshed on stats reads
    pub static ref QUEUE_WAITING: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_waiting", METRIC_PREFIX),
        "Jobs waiting per channel queue",
        &["channel"]
    ).unwrap();

    pub static ref QUEUE_ACTIVE: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_active", METRIC_PREFIX),
        "Jobs leased per channel queue",
        &["channel"]
    ).unwrap();
}

/// Encode the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
