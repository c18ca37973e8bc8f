use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::app::ports::PageFetcher;
use crate::config::{Config, ListingConfig};
use crate::constants::LISTING_SOURCE;
use crate::error::{Result, ScraperError};
use crate::metrics::pipeline::DropReason;
use crate::metrics::{PipelineMetrics, SourcesMetrics};
use crate::pipeline::classify::Classifier;
use crate::pipeline::datetime::{DateTimeNormalizer, EndHint};
use crate::pipeline::enrich::{DetailEnricher, DetailExtractor, Enrichment};
use crate::pipeline::locality::LocalityResolver;
use crate::pipeline::segment::{ListingSegmenter, PageOutcome};
use crate::pipeline::text::{has_year, is_clock_time, LineScan};
use crate::types::{EventRecord, EventSource, RawBlock, SourceBatch, SourceTag, TemporalValue, TimeSpan};

/// What became of one listing block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Kept(EventRecord),
    OtherPlace,
    Unparseable(String),
}

/// Paginated listing crawler with per-event detail enrichment.
pub struct InCobhCrawler {
    fetcher: Arc<dyn PageFetcher>,
    listing: ListingConfig,
    segmenter: ListingSegmenter,
    resolver: LocalityResolver,
    normalizer: DateTimeNormalizer,
    enricher: DetailEnricher,
    classifier: Classifier,
}

impl InCobhCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Result<Self> {
        let first_page = reqwest::Url::parse(&config.listing.first_page_url).map_err(|e| {
            ScraperError::Config(format!(
                "listing.first_page_url '{}' is not a URL: {}",
                config.listing.first_page_url, e
            ))
        })?;
        let authority = first_page.origin().ascii_serialization();

        let normalizer = DateTimeNormalizer::from_config(&config.time);
        let resolver = LocalityResolver::from_config(&config.place);
        let extractor = DetailExtractor::new(normalizer.clone(), resolver.clone(), &config.listing);

        Ok(Self {
            enricher: DetailEnricher::new(Arc::clone(&fetcher), extractor),
            fetcher,
            listing: config.listing.clone(),
            segmenter: ListingSegmenter::new(&config.listing.heading_tag, &authority),
            resolver,
            normalizer,
            classifier: Classifier,
        })
    }

    /// Fetches and enriches one block, then decides on it.
    pub async fn process_block(&self, block: &RawBlock) -> BlockOutcome {
        let enrichment = match block.detail_url.as_deref() {
            Some(url) => self.enricher.enrich(url).await,
            None => Enrichment::unknown(),
        };
        self.build_record(block, &enrichment)
    }

    /// Locality filter, span selection and classification for one block.
    pub fn build_record(&self, block: &RawBlock, enrichment: &Enrichment) -> BlockOutcome {
        if !self.resolver.resolve(&block.lines, &enrichment.locality) {
            return BlockOutcome::OtherPlace;
        }

        let span = match self.choose_span(block, enrichment) {
            Ok(span) => span,
            Err(e) => return BlockOutcome::Unparseable(e.to_string()),
        };

        let title = if block.title.is_empty() {
            block.lines.first().cloned().unwrap_or_default()
        } else {
            block.title.clone()
        };
        let tags: BTreeSet<String> = enrichment.tags.iter().cloned().collect();
        let category = self.classifier.classify(&title, &tags);

        BlockOutcome::Kept(EventRecord {
            title,
            start: span.start,
            end: span.end,
            location: enrichment
                .venue
                .clone()
                .unwrap_or_else(|| self.resolver.target().to_string()),
            source_tag: SourceTag::ListingSource,
            tags,
            detail_url: block.detail_url.clone(),
            notes: None,
            category,
        })
    }

    /// A timed detail start wins. A detail date range wins unless the
    /// listing has a time on a day inside that range. Without a detail
    /// start the listing text decides.
    fn choose_span(&self, block: &RawBlock, enrichment: &Enrichment) -> Result<TimeSpan> {
        match enrichment.start {
            Some(start @ TemporalValue::Instant(_)) => Ok(self.normalizer.reconcile(start, enrichment.end)),
            Some(start @ TemporalValue::Date(first_day)) => {
                let detail = self.normalizer.reconcile(start, enrichment.end);
                let last_day = detail.end.date().pred_opt().unwrap_or(first_day);
                match self.listing_span(&block.lines) {
                    Ok(listing)
                        if !listing.is_all_day()
                            && (first_day..=last_day).contains(&listing.start.date()) =>
                    {
                        Ok(listing)
                    }
                    _ => Ok(detail),
                }
            }
            None => self.listing_span(&block.lines),
        }
    }

    /// Date from the first line with a year after the target place line,
    /// time from the first bare clock line; no time means all day.
    pub fn listing_span<S: AsRef<str>>(&self, lines: &[S]) -> Result<TimeSpan> {
        let target = self.resolver.target();
        let scan = LineScan::new(lines).after_first(|l| l == target);
        let date_line = scan
            .first(has_year)
            .ok_or_else(|| ScraperError::Parse("no date line in listing block".into()))?;
        let time_line = scan.first(is_clock_time).unwrap_or_default();
        self.normalizer.normalize(date_line, time_line, EndHint::default())
    }

    async fn fetch_page(&self, page: u32) -> Result<String> {
        let url = self.listing.page_url(page);
        let started = Instant::now();
        let html = self.fetcher.fetch(&url).await?;
        SourcesMetrics::record_page_fetched(LISTING_SOURCE, started.elapsed().as_secs_f64());
        Ok(html)
    }
}

#[async_trait::async_trait]
impl EventSource for InCobhCrawler {
    fn source_name(&self) -> &'static str {
        LISTING_SOURCE
    }

    #[instrument(skip(self))]
    async fn collect(&self) -> Result<SourceBatch> {
        info!("Fetching listing pages from {}", self.listing.first_page_url);
        let mut batch = SourceBatch::default();

        for page in 1..=self.listing.max_pages {
            let html = match self.fetch_page(page).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Listing page {} fetch failed, stopping: {}", page, e);
                    SourcesMetrics::record_page_fetch_error(LISTING_SOURCE);
                    break;
                }
            };
            batch.pages += 1;

            let blocks = match self.segmenter.segment(&html) {
                PageOutcome::Blocks(blocks) => blocks,
                PageOutcome::Exhausted => {
                    debug!("Listing page {} has no event headings, stopping", page);
                    break;
                }
            };
            SourcesMetrics::record_blocks_segmented(LISTING_SOURCE, blocks.len());

            let mut page_added = 0;
            for block in &blocks {
                match self.process_block(block).await {
                    BlockOutcome::Kept(record) => {
                        batch.records.push(record);
                        page_added += 1;
                    }
                    BlockOutcome::OtherPlace => {
                        debug!("Skipping '{}': not in {}", block.title, self.resolver.target());
                        PipelineMetrics::record_dropped(LISTING_SOURCE, DropReason::OtherPlace);
                        batch.dropped += 1;
                    }
                    BlockOutcome::Unparseable(reason) => {
                        warn!("Skipping '{}': {}", block.title, reason);
                        PipelineMetrics::record_dropped(LISTING_SOURCE, DropReason::Unparseable);
                        batch.dropped += 1;
                    }
                }
            }
            // pages with no local events do not end pagination
            debug!("Listing page {}: added {} of {} blocks", page, page_added, blocks.len());
        }

        info!(
            "Collected {} listing events from {} pages",
            batch.records.len(),
            batch.pages
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::Category;
    use crate::types::LocalitySignal;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};

    struct NoFetch;

    #[async_trait]
    impl PageFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(ScraperError::Fetch {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn crawler() -> InCobhCrawler {
        InCobhCrawler::new(Arc::new(NoFetch), &Config::default()).unwrap()
    }

    fn block(lines: &[&str]) -> RawBlock {
        RawBlock {
            title: lines[0].to_string(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
            detail_url: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn kept(outcome: BlockOutcome) -> EventRecord {
        match outcome {
            BlockOutcome::Kept(r) => r,
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn market_block_without_detail_is_all_day() {
        let c = crawler();
        let b = block(&["Community Market", "Cobh", "Sat 14 March 2026", "Craft stalls and food trucks"]);
        let r = kept(c.build_record(&b, &Enrichment::unknown()));
        assert_eq!(r.start, TemporalValue::Date(date(2026, 3, 14)));
        assert_eq!(r.end, TemporalValue::Date(date(2026, 3, 15)));
        assert_eq!(r.category, Category::Market);
        assert_eq!(r.location, "Cobh");
    }

    #[test]
    fn listing_time_after_place_line_is_used() {
        let c = crawler();
        let b = block(&["Film Club 2025 Season", "Cobh", "Fri 20 March 2026", "19:30"]);
        let r = kept(c.build_record(&b, &Enrichment::unknown()));
        let tz = chrono_tz::Europe::Dublin;
        assert_eq!(r.start, TemporalValue::Instant(tz.with_ymd_and_hms(2026, 3, 20, 19, 30, 0).unwrap()));
        assert_eq!(r.end, TemporalValue::Instant(tz.with_ymd_and_hms(2026, 3, 20, 21, 30, 0).unwrap()));
    }

    #[test]
    fn detail_locality_overrides_listing() {
        let c = crawler();
        let b = block(&["Gig", "Cobh", "Sat 14 March 2026"]);
        let mut detail = Enrichment::unknown();
        detail.locality = LocalitySignal::Rejected("Cork".into());
        assert_eq!(c.build_record(&b, &detail), BlockOutcome::OtherPlace);
    }

    #[test]
    fn block_without_date_is_unparseable() {
        let c = crawler();
        let b = block(&["Mystery Tour", "Cobh", "Date to be announced"]);
        assert!(matches!(
            c.build_record(&b, &Enrichment::unknown()),
            BlockOutcome::Unparseable(_)
        ));
    }

    #[test]
    fn detail_range_yields_to_timed_listing_inside_it() {
        let c = crawler();
        let mut detail = Enrichment::unknown();
        detail.start = Some(TemporalValue::Date(date(2026, 5, 14)));
        detail.end = Some(TemporalValue::Date(date(2026, 5, 16)));
        detail.venue = Some("Kennedy Park".into());

        let inside = block(&["Harbour Festival", "Cobh", "Fri 15 May 2026", "18:00"]);
        let r = kept(c.build_record(&inside, &detail));
        assert!(!r.is_all_day());
        assert_eq!(r.start.date(), date(2026, 5, 15));
        assert_eq!(r.location, "Kennedy Park");

        let outside = block(&["Harbour Festival", "Cobh", "Fri 22 May 2026", "18:00"]);
        let r = kept(c.build_record(&outside, &detail));
        assert_eq!(r.start, TemporalValue::Date(date(2026, 5, 14)));
        assert_eq!(r.end, TemporalValue::Date(date(2026, 5, 17)));

        let all_day = block(&["Harbour Festival", "Cobh", "Fri 15 May 2026"]);
        let r = kept(c.build_record(&all_day, &detail));
        assert_eq!(r.start, TemporalValue::Date(date(2026, 5, 14)));
    }

    #[test]
    fn timed_detail_start_wins() {
        let c = crawler();
        let tz = chrono_tz::Europe::Dublin;
        let start = tz.with_ymd_and_hms(2026, 4, 17, 21, 0, 0).unwrap();
        let mut detail = Enrichment::unknown();
        detail.start = Some(TemporalValue::Instant(start));
        detail.tags = vec!["Music".into()];

        let b = block(&["Quays Night", "Cobh", "Fri 17 April 2026", "20:00"]);
        let r = kept(c.build_record(&b, &detail));
        assert_eq!(r.start, TemporalValue::Instant(start));
        assert_eq!(r.category, Category::Music);
        assert!(r.tags.contains("Music"));
    }
}
