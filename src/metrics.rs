/// Metrics and telemetry for the DID registry
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - DID creations and new versions
/// - Lifecycle transitions and their outcomes
/// - Notification delivery per channel
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};

lazy_static! {
    // ========== Registry Metrics ==========

    /// DIDs registered, by method
    pub static ref DIDS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_dids_created_total",
        "Total number of DIDs registered",
        &["method"]
    )
    .unwrap();

    /// New versions appended to existing chains
    pub static ref VERSIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_versions_created_total",
        "Total number of DID document versions created by update",
        &["outcome"]
    )
    .unwrap();

    /// Lifecycle transitions by kind and outcome
    pub static ref TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_transitions_total",
        "Total number of lifecycle transitions attempted",
        &["transition", "outcome"]
    )
    .unwrap();

    /// Stored records by status, refreshed by the stats job
    pub static ref DIDS_BY_STATUS: IntGaugeVec = register_int_gauge_vec!(
        "did_registry_dids_by_status",
        "Number of stored DID records per status",
        &["status"]
    )
    .unwrap();

    // ========== Notification Metrics ==========

    /// Notification deliveries by channel and outcome
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_notifications_total",
        "Total number of notification deliveries",
        &["channel", "outcome"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "did_registry_background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Errors by type and module
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "did_registry_errors_total",
        "Total number of errors",
        &["error_type", "module"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record a newly registered DID
pub fn record_did_created(method: &str) {
    DIDS_CREATED_TOTAL.with_label_values(&[method]).inc();
}

/// Record an update attempt
pub fn record_version_created(success: bool) {
    VERSIONS_CREATED_TOTAL
        .with_label_values(&[outcome(success)])
        .inc();
}

/// Record a lifecycle transition attempt
pub fn record_transition(transition: &str, success: bool) {
    TRANSITIONS_TOTAL
        .with_label_values(&[transition, outcome(success)])
        .inc();
}

/// Set the stored record count for a status
pub fn set_dids_by_status(status: &str, count: i64) {
    DIDS_BY_STATUS.with_label_values(&[status]).set(count);
}

/// Record a notification delivery
pub fn record_notification(channel: &str, success: bool) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[channel, outcome(success)])
        .inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

/// Record an error
pub fn record_error(error_type: &str, module: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, module])
        .inc();
}
