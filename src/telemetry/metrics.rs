//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Resolutions are in-memory and fast, so the low end is finer than the
    // Prometheus defaults.
    let buckets = [
        0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so the scrape
/// output has HELP/TYPE lines from startup.
pub fn describe_metrics() {
    describe_counter!("routing_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "routing_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "routing_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "routing_resolutions_total",
        "Route, version and override resolutions by kind and outcome"
    );
    describe_counter!(
        "routing_store_conflicts_total",
        "Optimistic write conflicts observed, by operation"
    );
    describe_counter!(
        "routing_cleanup_removed_versions_total",
        "Installed versions removed by cleanup"
    );

    for (kind, outcome) in [("route", "matched"), ("version", "highest"), ("override", "resolved")] {
        counter!("routing_resolutions_total", "kind" => kind, "outcome" => outcome).absolute(0);
    }
    counter!("routing_cleanup_removed_versions_total").absolute(0);
    gauge!("routing_http_requests_in_flight").set(0.0);
}
