//! Record-level metrics: what was kept, dropped and emitted.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct PipelineMetrics;

/// Why a candidate never became a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    OtherPlace,
    OtherBerth,
    Unparseable,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::OtherPlace => "other_place",
            DropReason::OtherBerth => "other_berth",
            DropReason::Unparseable => "unparseable",
        }
    }
}

impl PipelineMetrics {
    pub fn record_dropped(source: &'static str, reason: DropReason) {
        ::metrics::counter!(
            phase_metric!(counter, "pipeline", "records_dropped"),
            "source" => source,
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    pub fn record_duplicates_removed(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "duplicates_removed"))
            .increment(count as u64);
    }

    pub fn record_emitted(source: &'static str, count: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "records_emitted"), "source" => source)
            .increment(count as u64);
    }
}

impl PhaseMetrics for PipelineMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "pipeline", "records_dropped"));
        let _ = counter!(phase_metric!(counter, "pipeline", "duplicates_removed"));
        let _ = counter!(phase_metric!(counter, "pipeline", "records_emitted"));
    }

    fn phase_name() -> &'static str {
        "pipeline"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "records_dropped"),
                metric_type: MetricType::Counter,
                help: "Candidates dropped before becoming records",
                labels: vec!["source", "reason"],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "duplicates_removed"),
                metric_type: MetricType::Counter,
                help: "Records removed because an earlier record had the same identity",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "records_emitted"),
                metric_type: MetricType::Counter,
                help: "Records handed to the output sink",
                labels: vec!["source"],
            },
        ]
    }
}
