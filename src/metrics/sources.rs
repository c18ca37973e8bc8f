//! Source fetch metrics: listing pages, schedule pages and detail pages.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct SourcesMetrics;

impl SourcesMetrics {
    pub fn record_page_fetched(source: &'static str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "sources", "pages_fetched"), "source" => source)
            .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "sources", "page_fetch_seconds"), "source" => source)
            .record(duration_secs);
    }

    pub fn record_page_fetch_error(source: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "sources", "page_fetch_errors"), "source" => source)
            .increment(1);
    }

    pub fn record_detail_fetch_error() {
        ::metrics::counter!(phase_metric!(counter, "sources", "detail_fetch_errors")).increment(1);
    }

    pub fn record_blocks_segmented(source: &'static str, blocks: usize) {
        ::metrics::counter!(phase_metric!(counter, "sources", "blocks_segmented"), "source" => source)
            .increment(blocks as u64);
    }
}

impl PhaseMetrics for SourcesMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "sources", "pages_fetched"));
        let _ = counter!(phase_metric!(counter, "sources", "page_fetch_errors"));
        let _ = counter!(phase_metric!(counter, "sources", "detail_fetch_errors"));
        let _ = counter!(phase_metric!(counter, "sources", "blocks_segmented"));
        let _ = histogram!(phase_metric!(histogram, "sources", "page_fetch_seconds"));
    }

    fn phase_name() -> &'static str {
        "sources"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "sources", "pages_fetched"),
                metric_type: MetricType::Counter,
                help: "Listing and schedule pages fetched successfully",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "page_fetch_errors"),
                metric_type: MetricType::Counter,
                help: "Primary page fetches that failed and stopped a source",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "detail_fetch_errors"),
                metric_type: MetricType::Counter,
                help: "Detail page fetches that fell back to unknown signals",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "blocks_segmented"),
                metric_type: MetricType::Counter,
                help: "Candidate event blocks found on listing pages",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "sources", "page_fetch_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent fetching a primary page",
                labels: vec!["source"],
            },
        ]
    }
}
