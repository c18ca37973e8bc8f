use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::constants;
use crate::pipeline::classify::Category;

/// Cleaned text lines for one candidate event on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub title: String,
    pub lines: Vec<String>,
    pub detail_url: Option<String>,
}

/// Whether a candidate event belongs to the target place.
///
/// Listing heuristics and detail metadata each produce one of these; the two
/// are never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalitySignal {
    /// The named place is the target place.
    Confirmed(String),
    /// The named place is somewhere else.
    Rejected(String),
    Unknown,
}

impl LocalitySignal {
    pub fn is_unknown(&self) -> bool {
        matches!(self, LocalitySignal::Unknown)
    }
}

/// A civil instant in the target timezone, or a bare calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalValue {
    Instant(DateTime<Tz>),
    Date(NaiveDate),
}

impl TemporalValue {
    pub fn date(&self) -> NaiveDate {
        match self {
            TemporalValue::Instant(dt) => dt.date_naive(),
            TemporalValue::Date(d) => *d,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, TemporalValue::Date(_))
    }

    /// Canonical string used in identity keys.
    pub fn canonical(&self) -> String {
        match self {
            TemporalValue::Instant(dt) => dt.format("%Y%m%dT%H%M").to_string(),
            TemporalValue::Date(d) => d.format("%Y%m%d").to_string(),
        }
    }

    /// Compact stamp for rendered identifiers; dates render as midnight.
    pub fn stamp(&self) -> String {
        match self {
            TemporalValue::Instant(dt) => dt.format("%Y%m%dT%H%M").to_string(),
            TemporalValue::Date(d) => d.format("%Y%m%dT0000").to_string(),
        }
    }

    /// RFC 3339 for instants, `YYYY-MM-DD` for dates.
    pub fn to_iso(&self) -> String {
        match self {
            TemporalValue::Instant(dt) => dt.to_rfc3339(),
            TemporalValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for TemporalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

/// Start and end of one event, always of the same variant.
///
/// When both are dates, `end` is exclusive. Built by
/// [`crate::pipeline::datetime::DateTimeNormalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub start: TemporalValue,
    pub end: TemporalValue,
}

impl TimeSpan {
    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    SheetSource,
    ListingSource,
    ScheduleSource,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::SheetSource => "sheet",
            SourceTag::ListingSource => constants::LISTING_SOURCE,
            SourceTag::ScheduleSource => constants::SCHEDULE_SOURCE,
        }
    }

    pub fn attribution(&self) -> &'static str {
        match self {
            SourceTag::SheetSource => constants::SHEET_ATTRIBUTION,
            SourceTag::ListingSource => constants::LISTING_ATTRIBUTION,
            SourceTag::ScheduleSource => constants::SCHEDULE_ATTRIBUTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerTier {
    Small,
    Medium,
    Large,
}

impl PassengerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerTier::Small => "small",
            PassengerTier::Medium => "medium",
            PassengerTier::Large => "large",
        }
    }

    pub fn tag(&self) -> String {
        format!("passengers:{}", self.as_str())
    }
}

/// A normalized calendar event, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub title: String,
    pub start: TemporalValue,
    pub end: TemporalValue,
    pub location: String,
    pub source_tag: SourceTag,
    pub tags: BTreeSet<String>,
    pub detail_url: Option<String>,
    pub notes: Option<String>,
    pub category: Category,
}

impl EventRecord {
    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }
}

/// What one source produced in a run.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub records: Vec<EventRecord>,
    pub pages: u32,
    pub dropped: usize,
}

/// A primary page source that yields normalized records.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Unique name used in logs, metrics and the CLI summary
    fn source_name(&self) -> &'static str;

    /// Fetch and normalize everything this source currently lists
    async fn collect(&self) -> crate::error::Result<SourceBatch>;
}
