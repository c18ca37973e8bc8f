use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::ports::RecordSink;
use crate::error::{Result, ScraperError};
use crate::metrics::PipelineMetrics;
use crate::pipeline::identity;
use crate::types::{EventRecord, EventSource};

/// Per-source line of the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: &'static str,
    pub records: usize,
    pub pages: u32,
    pub dropped: usize,
    pub error: Option<String>,
    /// The failure was a network or HTTP status error, not bad markup.
    pub unreachable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
    pub duplicates_removed: usize,
    pub emitted: usize,
}

/// Runs every source in turn, dedups the combined records and hands them
/// to the sink. A failing source is reported and skipped; the run fails
/// only when no source produced anything.
pub struct CollectUseCase {
    sources: Vec<Box<dyn EventSource>>,
    sink: Arc<dyn RecordSink>,
}

impl CollectUseCase {
    pub fn new(sources: Vec<Box<dyn EventSource>>, sink: Arc<dyn RecordSink>) -> Self {
        Self { sources, sink }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut reports = Vec::with_capacity(self.sources.len());
        let mut combined: Vec<EventRecord> = Vec::new();

        for source in &self.sources {
            let name = source.source_name();
            match source.collect().await {
                Ok(batch) => {
                    info!("{}: {} records from {} pages", name, batch.records.len(), batch.pages);
                    reports.push(SourceReport {
                        source: name,
                        records: batch.records.len(),
                        pages: batch.pages,
                        dropped: batch.dropped,
                        error: None,
                        unreachable: false,
                    });
                    combined.extend(batch.records);
                }
                Err(e) => {
                    let unreachable = e.is_fetch();
                    if unreachable {
                        warn!("{} unreachable: {}", name, e);
                    } else {
                        error!("{} failed: {}", name, e);
                    }
                    reports.push(SourceReport {
                        source: name,
                        records: 0,
                        pages: 0,
                        dropped: 0,
                        error: Some(e.to_string()),
                        unreachable,
                    });
                }
            }
        }

        let before = combined.len();
        let records = identity::dedup(combined);
        let duplicates_removed = before - records.len();
        if duplicates_removed > 0 {
            info!("Removed {} duplicate records", duplicates_removed);
            PipelineMetrics::record_duplicates_removed(duplicates_removed);
        }

        if records.is_empty() {
            return Err(ScraperError::NoEvents);
        }

        for record in &records {
            self.sink.append(record).await?;
        }
        for report in &reports {
            let emitted = records
                .iter()
                .filter(|r| r.source_tag.as_str() == report.source)
                .count();
            PipelineMetrics::record_emitted(report.source, emitted);
        }
        let emitted = self.sink.finish().await?;

        Ok(RunSummary {
            reports,
            duplicates_removed,
            emitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::calendar_sink::MemorySink;
    use crate::pipeline::classify::Category;
    use crate::types::{SourceBatch, SourceTag, TemporalValue};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    struct FixedSource {
        name: &'static str,
        titles: Vec<&'static str>,
    }

    #[async_trait]
    impl EventSource for FixedSource {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn collect(&self) -> Result<SourceBatch> {
            let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
            let records = self
                .titles
                .iter()
                .map(|t| EventRecord {
                    title: t.to_string(),
                    start: TemporalValue::Date(day),
                    end: TemporalValue::Date(day.succ_opt().unwrap()),
                    location: "Cobh".into(),
                    source_tag: SourceTag::ListingSource,
                    tags: BTreeSet::new(),
                    detail_url: None,
                    notes: None,
                    category: Category::General,
                })
                .collect();
            Ok(SourceBatch {
                records,
                pages: 1,
                dropped: 0,
            })
        }
    }

    struct BrokenSource {
        offline: bool,
    }

    #[async_trait]
    impl EventSource for BrokenSource {
        fn source_name(&self) -> &'static str {
            "broken"
        }

        async fn collect(&self) -> Result<SourceBatch> {
            if self.offline {
                Err(ScraperError::Fetch {
                    url: "https://port.test/schedule".into(),
                    status: 503,
                })
            } else {
                Err(ScraperError::Structure("no header".into()))
            }
        }
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_siblings() {
        let sink = Arc::new(MemorySink::default());
        let use_case = CollectUseCase::new(
            vec![
                Box::new(BrokenSource { offline: false }),
                Box::new(FixedSource {
                    name: "incobh",
                    titles: vec!["Community Market", "Community Market", "Walk"],
                }),
            ],
            sink.clone(),
        );

        let summary = use_case.run().await.unwrap();
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.emitted, 2);
        assert!(summary.reports[0].error.is_some());
        assert!(!summary.reports[0].unreachable);
        assert_eq!(summary.reports[1].records, 3);
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn zero_records_overall_is_a_run_failure() {
        let sink = Arc::new(MemorySink::default());
        let use_case = CollectUseCase::new(
            vec![
                Box::new(BrokenSource { offline: false }),
                Box::new(FixedSource {
                    name: "incobh",
                    titles: vec![],
                }),
            ],
            sink.clone(),
        );
        assert!(matches!(use_case.run().await, Err(ScraperError::NoEvents)));
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn fetch_failures_are_reported_as_unreachable() {
        let sink = Arc::new(MemorySink::default());
        let use_case = CollectUseCase::new(
            vec![
                Box::new(BrokenSource { offline: true }),
                Box::new(FixedSource {
                    name: "incobh",
                    titles: vec!["Walk"],
                }),
            ],
            sink,
        );

        let summary = use_case.run().await.unwrap();
        assert!(summary.reports[0].unreachable);
        assert!(summary.reports[0].error.as_deref().unwrap().contains("503"));
        assert!(!summary.reports[1].unreachable);
    }
}
