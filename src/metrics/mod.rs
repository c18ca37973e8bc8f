//! Metrics for the collection run.
//!
//! Each phase owns a submodule with its counters. Without an installed
//! recorder the `metrics` facade is a no-op, so the exporter is only set up
//! when `COBH_METRICS_ADDR` is present.

pub mod pipeline;
pub mod sources;

pub use pipeline::PipelineMetrics;
pub use sources::SourcesMetrics;

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Installs the Prometheus exporter if `COBH_METRICS_ADDR` is set.
///
/// Idempotent. Returns whether an exporter address was configured.
pub fn init_metrics() -> bool {
    let Ok(addr_str) = std::env::var("COBH_METRICS_ADDR") else {
        return false;
    };

    INIT.call_once(|| {
        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid COBH_METRICS_ADDR '{}': {}", addr_str, e);
                return;
            }
        };

        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => {
                info!("Prometheus exporter listening on http://{}/metrics", addr);
                register_all_metrics();
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
    true
}

fn register_all_metrics() {
    SourcesMetrics::register_metrics();
    PipelineMetrics::register_metrics();
    let documented = SourcesMetrics::metrics_documentation().len()
        + PipelineMetrics::metrics_documentation().len();
    info!("Registered {} metrics", documented);
}

/// Registration and documentation for one phase's metrics.
pub trait PhaseMetrics {
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    #[allow(dead_code)]
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// cobh_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("cobh_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("cobh_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
