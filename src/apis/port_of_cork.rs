use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::app::ports::PageFetcher;
use crate::config::{Config, PassengerTiers};
use crate::constants::SCHEDULE_SOURCE;
use crate::error::Result;
use crate::metrics::pipeline::DropReason;
use crate::metrics::{PipelineMetrics, SourcesMetrics};
use crate::pipeline::classify::Classifier;
use crate::pipeline::datetime::DateTimeNormalizer;
use crate::pipeline::schedule::{CruiseCall, ScheduleTableParser};
use crate::types::{EventRecord, EventSource, SourceBatch, SourceTag};

pub const CRUISE_TAG: &str = "cruise";

/// Single-page cruise schedule crawler.
pub struct PortOfCorkCrawler {
    fetcher: Arc<dyn PageFetcher>,
    url: String,
    tiers: PassengerTiers,
    parser: ScheduleTableParser,
    normalizer: DateTimeNormalizer,
    classifier: Classifier,
}

impl PortOfCorkCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        let normalizer = DateTimeNormalizer::from_config(&config.time);
        Self {
            fetcher,
            url: config.schedule.url.clone(),
            tiers: config.schedule.passenger_tiers,
            parser: ScheduleTableParser::new(normalizer.clone(), &config.schedule),
            normalizer,
            classifier: Classifier,
        }
    }

    /// Maps a retained call to a timed record tagged with its passenger tier.
    pub fn call_to_record(&self, call: &CruiseCall) -> EventRecord {
        let span = self.normalizer.timed(call.arrival, Some(call.departure));
        let tier = call.passengers.map(|p| self.tiers.tier_for(p));

        let mut tags = BTreeSet::new();
        tags.insert(CRUISE_TAG.to_string());
        if let Some(tier) = tier {
            tags.insert(tier.tag());
        }
        if let Some(operator) = &call.operator {
            tags.insert(operator.clone());
        }

        let mut notes = Vec::new();
        if let Some(operator) = &call.operator {
            notes.push(format!("Cruise line: {}", operator));
        }
        if let (Some(passengers), Some(tier)) = (call.passengers, tier) {
            notes.push(format!("Passengers: {} ({})", passengers, tier.as_str()));
        }
        if let Some(id) = &call.vessel_id {
            notes.push(format!("IMO: {}", id));
        }
        notes.push(format!(
            "Departs {}",
            call.departure.format("%d/%m/%Y %H:%M")
        ));

        EventRecord {
            category: self.classifier.classify(&call.vessel, &tags),
            title: call.vessel.clone(),
            start: span.start,
            end: span.end,
            location: call.berth.clone(),
            source_tag: SourceTag::ScheduleSource,
            tags,
            detail_url: call.reference_link.clone(),
            notes: Some(notes.join("\n")),
        }
    }
}

#[async_trait::async_trait]
impl EventSource for PortOfCorkCrawler {
    fn source_name(&self) -> &'static str {
        SCHEDULE_SOURCE
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<SourceBatch> {
        info!("Fetching cruise schedule from {}", self.url);
        let started = Instant::now();
        let html = match self.fetcher.fetch(&self.url).await {
            Ok(html) => html,
            Err(e) => {
                SourcesMetrics::record_page_fetch_error(SCHEDULE_SOURCE);
                return Err(e);
            }
        };
        SourcesMetrics::record_page_fetched(SCHEDULE_SOURCE, started.elapsed().as_secs_f64());

        let parsed = self.parser.parse(&html)?;
        for _ in 0..parsed.other_berth {
            PipelineMetrics::record_dropped(SCHEDULE_SOURCE, DropReason::OtherBerth);
        }
        for _ in 0..parsed.unparseable {
            PipelineMetrics::record_dropped(SCHEDULE_SOURCE, DropReason::Unparseable);
        }
        if parsed.unparseable > 0 {
            warn!("{} schedule rows had unreadable times", parsed.unparseable);
        }

        let records: Vec<EventRecord> = parsed.calls.iter().map(|c| self.call_to_record(c)).collect();
        info!(
            "Collected {} cruise calls ({} at other berths)",
            records.len(),
            parsed.other_berth
        );

        Ok(SourceBatch {
            records,
            pages: 1,
            dropped: parsed.other_berth + parsed.unparseable,
        })
    }
}
