use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use crate::app::ports::RecordSink;
use crate::config::{OutputConfig, TimeConfig};
use crate::error::Result;
use crate::pipeline::identity;
use crate::types::{EventRecord, SourceTag};

pub const CRUISE_GLYPH: &str = "🚢";

/// One calendar event as written to the output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEntry {
    pub uid: String,
    pub dtstamp: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub location: String,
    pub description: String,
    pub source: SourceTag,
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// First line of the output file.
#[derive(Debug, Clone, Serialize)]
struct CalendarHeader<'a> {
    calendar: &'a str,
    timezone: &'a str,
    generated_at: String,
    events: usize,
}

/// Turns records into calendar entries with a shared run timestamp.
#[derive(Debug, Clone)]
pub struct CalendarComposer {
    uid_domain: String,
    creator_line: String,
    dtstamp: DateTime<Utc>,
}

impl CalendarComposer {
    pub fn new(output: &OutputConfig, dtstamp: DateTime<Utc>) -> Self {
        Self {
            uid_domain: output.uid_domain.clone(),
            creator_line: output.creator_line.clone(),
            dtstamp,
        }
    }

    pub fn compose(&self, record: &EventRecord) -> CalendarEntry {
        let glyph = match record.source_tag {
            SourceTag::ScheduleSource => CRUISE_GLYPH,
            _ => record.category.glyph(),
        };

        let mut description: Vec<String> = Vec::new();
        if let Some(notes) = record.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            description.push(notes.to_string());
            description.push(String::new());
        }
        if let Some(url) = &record.detail_url {
            description.push(format!("🔗 {}", url));
        }
        description.push(String::new());
        description.push(self.creator_line.clone());
        description.push(record.source_tag.attribution().to_string());

        CalendarEntry {
            uid: identity::uid(record, &self.uid_domain),
            dtstamp: self.dtstamp.format("%Y%m%dT%H%M%SZ").to_string(),
            summary: format!("{} {}", glyph, record.title),
            start: record.start.to_iso(),
            end: record.end.to_iso(),
            all_day: record.is_all_day(),
            location: record.location.clone(),
            description: description.join("\n"),
            source: record.source_tag,
            categories: record.tags.iter().cloned().collect(),
            url: record.detail_url.clone(),
        }
    }
}

/// Accumulates entries and writes them as NDJSON when the run finishes.
pub struct NdjsonCalendarSink {
    path: PathBuf,
    calendar_name: String,
    timezone: Tz,
    composer: CalendarComposer,
    entries: Mutex<Vec<CalendarEntry>>,
}

impl NdjsonCalendarSink {
    pub fn new(output: &OutputConfig, time: &TimeConfig, dtstamp: DateTime<Utc>) -> Self {
        Self {
            path: output.path.clone(),
            calendar_name: output.calendar_name.clone(),
            timezone: time.timezone,
            composer: CalendarComposer::new(output, dtstamp),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Output path, overriding the configured one.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CalendarEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordSink for NdjsonCalendarSink {
    async fn append(&self, record: &EventRecord) -> Result<()> {
        let entry = self.composer.compose(record);
        self.lock().push(entry);
        Ok(())
    }

    async fn finish(&self) -> Result<usize> {
        let entries = self.lock();
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        let header = CalendarHeader {
            calendar: &self.calendar_name,
            timezone: self.timezone.name(),
            generated_at: self.composer.dtstamp.to_rfc3339(),
            events: entries.len(),
        };
        serde_json::to_writer(&mut writer, &header)?;
        writer.write_all(b"\n")?;
        for entry in entries.iter() {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("Wrote {} events to {}", entries.len(), self.path.display());
        Ok(entries.len())
    }
}

/// Keeps records in memory; used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &EventRecord) -> Result<()> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn finish(&self) -> Result<usize> {
        Ok(self.records().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::Category;
    use crate::types::TemporalValue;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::BTreeSet;

    fn market() -> EventRecord {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        EventRecord {
            title: "Community Market".into(),
            start: TemporalValue::Date(day),
            end: TemporalValue::Date(day.succ_opt().unwrap()),
            location: "Cobh".into(),
            source_tag: SourceTag::ListingSource,
            tags: BTreeSet::new(),
            detail_url: Some("https://incobh.com/events/market/".into()),
            notes: None,
            category: Category::Market,
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn entry_has_glyph_summary_and_attribution() {
        let composer = CalendarComposer::new(&OutputConfig::default(), stamp());
        let entry = composer.compose(&market());
        assert_eq!(entry.summary, "👨‍🌾 Community Market");
        assert!(entry.all_day);
        assert_eq!(entry.start, "2026-03-14");
        assert_eq!(entry.end, "2026-03-15");
        assert_eq!(entry.dtstamp, "20260301T120000Z");
        assert_eq!(
            entry.description,
            "🔗 https://incobh.com/events/market/\n\nCreated by The Arch, Cobh\nData from InCobh.com"
        );
        assert!(entry.uid.ends_with("@thearchcobh"));
    }

    #[test]
    fn schedule_records_use_ship_glyph() {
        let composer = CalendarComposer::new(&OutputConfig::default(), stamp());
        let mut record = market();
        record.title = "Celebrity Apex".into();
        record.source_tag = SourceTag::ScheduleSource;
        record.notes = Some("Passengers: 4200 (large)".into());
        record.detail_url = None;
        let entry = composer.compose(&record);
        assert_eq!(entry.summary, "🚢 Celebrity Apex");
        assert!(entry.description.starts_with("Passengers: 4200 (large)\n\n"));
    }

    #[tokio::test]
    async fn ndjson_sink_writes_header_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("events.ndjson");
        let sink = NdjsonCalendarSink::new(&OutputConfig::default(), &TimeConfig::default(), stamp())
            .with_path(path.clone());

        sink.append(&market()).await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["calendar"], "Cobh Events (The Arch)");
        assert_eq!(lines[0]["timezone"], "Europe/Dublin");
        assert_eq!(lines[1]["summary"], "👨‍🌾 Community Market");
        assert_eq!(lines[1]["source"], "listing_source");
    }
}
