//! Per-event detail pages: structured metadata first, labelled sections
//! second, otherwise nothing.

use std::sync::Arc;

use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::app::ports::PageFetcher;
use crate::config::ListingConfig;
use crate::metrics::SourcesMetrics;
use crate::pipeline::datetime::DateTimeNormalizer;
use crate::pipeline::locality::LocalityResolver;
use crate::pipeline::text::{clean_line, split_clean_lines, LineScan};
use crate::types::{LocalitySignal, TemporalValue};

/// Fields a detail page can vouch for. Absent fields are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub venue: Option<String>,
    pub start: Option<TemporalValue>,
    pub end: Option<TemporalValue>,
    pub tags: Vec<String>,
    pub locality: LocalitySignal,
}

impl Enrichment {
    pub fn unknown() -> Self {
        Self {
            venue: None,
            start: None,
            end: None,
            tags: Vec::new(),
            locality: LocalitySignal::Unknown,
        }
    }
}

const SECTION_HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Pure extraction from detail page markup.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    normalizer: DateTimeNormalizer,
    resolver: LocalityResolver,
    location_label: String,
    event_dates_label: String,
    json_ld: Selector,
}

impl DetailExtractor {
    pub fn new(normalizer: DateTimeNormalizer, resolver: LocalityResolver, listing: &ListingConfig) -> Self {
        Self {
            normalizer,
            resolver,
            location_label: listing.location_label.clone(),
            event_dates_label: listing.event_dates_label.clone(),
            json_ld: Selector::parse(r#"script[type="application/ld+json"]"#).unwrap(),
        }
    }

    pub fn extract(&self, html: &str) -> Enrichment {
        let document = Html::parse_document(html);
        if let Some(found) = self.from_json_ld(&document) {
            return found;
        }
        if let Some(found) = self.from_sections(&document) {
            return found;
        }
        Enrichment::unknown()
    }

    fn from_json_ld(&self, document: &Html) -> Option<Enrichment> {
        for script in document.select(&self.json_ld) {
            let raw = script.text().collect::<String>();
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let payload: Value = match serde_json::from_str(raw) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Skipping unparsable JSON-LD block: {}", e);
                    continue;
                }
            };

            let mut objects = Vec::new();
            flatten_json_ld(&payload, &mut objects);
            if let Some(event) = objects.into_iter().find(|o| is_event_type(o.get("@type"))) {
                return Some(self.enrichment_from_event(event));
            }
        }
        None
    }

    fn enrichment_from_event(&self, event: &serde_json::Map<String, Value>) -> Enrichment {
        let temporal = |key: &str| {
            event
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| self.normalizer.parse_temporal(s))
        };

        let location = match event.get("location") {
            Some(Value::Array(items)) => items.iter().find(|v| v.is_object()),
            other => other,
        };
        let venue = location
            .and_then(|l| l.get("name"))
            .and_then(Value::as_str)
            .map(clean_line)
            .filter(|v| !v.is_empty());
        let locality = location
            .and_then(|l| l.get("address"))
            .and_then(|a| a.get("addressLocality"))
            .and_then(Value::as_str);

        let tags = match event.get("keywords") {
            Some(Value::String(s)) => s.split(',').map(clean_line).filter(|t| !t.is_empty()).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(clean_line)
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        Enrichment {
            venue,
            start: temporal("startDate"),
            end: temporal("endDate"),
            tags,
            locality: self.resolver.signal_from_metadata(locality),
        }
    }

    /// Text under a heading reading exactly one of the labels, up to the
    /// next heading. `None` when neither label heading exists.
    fn from_sections(&self, document: &Html) -> Option<Enrichment> {
        #[derive(Clone, Copy, PartialEq)]
        enum Section {
            Location,
            Dates,
        }

        let mut location: Option<Vec<String>> = None;
        let mut dates: Option<Vec<String>> = None;
        let mut open: Option<Section> = None;

        for node in document.tree.root().descendants() {
            match node.value() {
                Node::Element(el) if SECTION_HEADINGS.contains(&el.name()) => {
                    let Some(heading) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let label = clean_line(&heading.text().collect::<String>());
                    open = None;
                    if label.eq_ignore_ascii_case(&self.location_label) && location.is_none() {
                        location = Some(Vec::new());
                        open = Some(Section::Location);
                    } else if label.eq_ignore_ascii_case(&self.event_dates_label) && dates.is_none() {
                        dates = Some(Vec::new());
                        open = Some(Section::Dates);
                    }
                }
                Node::Text(text) => {
                    let lines = match open {
                        Some(Section::Location) => location.as_mut(),
                        Some(Section::Dates) => dates.as_mut(),
                        None => None,
                    };
                    let Some(lines) = lines else {
                        continue;
                    };
                    let skip = node.ancestors().any(|a| match a.value() {
                        Node::Element(el) => {
                            SECTION_HEADINGS.contains(&el.name())
                                || matches!(el.name(), "script" | "style" | "noscript")
                        }
                        _ => false,
                    });
                    if !skip {
                        lines.extend(split_clean_lines(text));
                    }
                }
                _ => {}
            }
        }

        if location.is_none() && dates.is_none() {
            return None;
        }

        let venue = location
            .as_deref()
            .and_then(|lines| LineScan::new(lines).first(|_| true))
            .map(str::to_string);

        let parsed: Vec<_> = dates
            .as_deref()
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|l| self.normalizer.parse_date_range(l))
                    .flat_map(|(start, end)| std::iter::once(start).chain(end))
                    .collect()
            })
            .unwrap_or_default();
        let first = parsed.iter().min().copied();
        let last = parsed.iter().max().copied();

        Some(Enrichment {
            venue,
            start: first.map(TemporalValue::Date),
            end: last.filter(|l| Some(*l) > first).map(TemporalValue::Date),
            tags: Vec::new(),
            locality: LocalitySignal::Unknown,
        })
    }
}

fn flatten_json_ld<'a>(value: &'a Value, out: &mut Vec<&'a serde_json::Map<String, Value>>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| flatten_json_ld(v, out)),
        Value::Object(map) => {
            out.push(map);
            if let Some(graph) = map.get("@graph") {
                flatten_json_ld(graph, out);
            }
        }
        _ => {}
    }
}

fn is_event_type(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(t)) => t.ends_with("Event"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.ends_with("Event"))),
        _ => false,
    }
}

/// Fetches detail pages. Never fails: fetch errors degrade to
/// [`Enrichment::unknown`].
pub struct DetailEnricher {
    fetcher: Arc<dyn PageFetcher>,
    extractor: DetailExtractor,
}

impl DetailEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: DetailExtractor) -> Self {
        Self { fetcher, extractor }
    }

    #[instrument(skip(self))]
    pub async fn enrich(&self, detail_url: &str) -> Enrichment {
        match self.fetcher.fetch(detail_url).await {
            Ok(html) => self.extractor.extract(&html),
            Err(e) => {
                warn!("Could not fetch detail page {}: {}", detail_url, e);
                SourcesMetrics::record_detail_fetch_error();
                Enrichment::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScraperError};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn extractor() -> DetailExtractor {
        DetailExtractor::new(
            DateTimeNormalizer::new(chrono_tz::Europe::Dublin, Duration::hours(2), 2020),
            LocalityResolver::new("Cobh", vec!["Cobh".into(), "Cork".into()]),
            &ListingConfig::default(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn json_ld_event_is_authoritative() {
        let html = r#"<html><head>
            <script type="application/ld+json">not json</script>
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [
              {"@type": "WebPage", "name": "Events"},
              {"@type": "MusicEvent", "name": "Trad Night",
               "startDate": "2026-04-17T21:00:00+01:00",
               "endDate": "2026-04-17T23:30:00+01:00",
               "location": {"@type": "Place", "name": "The Quays Bar",
                            "address": {"addressLocality": "Cobh"}},
               "keywords": "Music, Trad ,"}
            ]}
            </script></head>
            <body><h2>Location</h2><p>Somewhere Else</p></body></html>"#;
        let e = extractor().extract(html);
        assert_eq!(e.venue.as_deref(), Some("The Quays Bar"));
        assert_eq!(e.locality, LocalitySignal::Confirmed("Cobh".into()));
        assert_eq!(e.tags, vec!["Music", "Trad"]);
        assert_eq!(
            e.start,
            Some(TemporalValue::Instant(
                chrono_tz::Europe::Dublin.with_ymd_and_hms(2026, 4, 17, 21, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn json_ld_dates_and_foreign_locality() {
        let html = r#"<script type="application/ld+json">
            [{"@type": ["Thing", "Event"], "startDate": "2026-05-01", "endDate": "2026-05-03",
              "location": [{"name": "City Hall", "address": {"addressLocality": "Cork"}}],
              "keywords": ["Festival", ""]}]
            </script>"#;
        let e = extractor().extract(html);
        assert_eq!(e.start, Some(TemporalValue::Date(date(2026, 5, 1))));
        assert_eq!(e.end, Some(TemporalValue::Date(date(2026, 5, 3))));
        assert_eq!(e.locality, LocalitySignal::Rejected("Cork".into()));
        assert_eq!(e.tags, vec!["Festival"]);
    }

    #[test]
    fn json_ld_without_locality_is_unknown() {
        let html = r#"<script type="application/ld+json">
            {"@type": "Event", "startDate": "2026-05-01", "location": {"name": "Pier"}}
            </script>"#;
        let e = extractor().extract(html);
        assert!(e.locality.is_unknown());
        assert_eq!(e.venue.as_deref(), Some("Pier"));
    }

    #[test]
    fn labelled_sections_are_used_without_metadata() {
        let html = r#"<body>
            <h1>Harbour Festival</h1>
            <p>Lots happening 2027</p>
            <h4>Location</h4><p>Kennedy Park</p><p>Cobh</p>
            <h4>Event Dates</h4>
            <ul><li>Sat 16 May 2026</li><li>14 May 2026</li><li>tickets at the door</li></ul>
            <h4>Share</h4><p>1 June 2026</p>
            </body>"#;
        let e = extractor().extract(html);
        assert_eq!(e.venue.as_deref(), Some("Kennedy Park"));
        assert_eq!(e.start, Some(TemporalValue::Date(date(2026, 5, 14))));
        assert_eq!(e.end, Some(TemporalValue::Date(date(2026, 5, 16))));
        assert!(e.locality.is_unknown());
    }

    #[test]
    fn page_without_signals_is_all_unknown() {
        let html = "<body><h1>Harbour Festival</h1><p>Kennedy Park, Cobh, 14 May 2026</p></body>";
        assert_eq!(extractor().extract(html), Enrichment::unknown());
    }

    struct FailingFetcher;

    #[async_trait]
    impl PageFetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(ScraperError::Fetch {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_unknown() {
        let enricher = DetailEnricher::new(Arc::new(FailingFetcher), extractor());
        let e = enricher.enrich("https://incobh.com/events/x/").await;
        assert_eq!(e, Enrichment::unknown());
    }
}
