//! Stable identity for records: dedup keys and emitted uids.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::pipeline::text::slugify;
use crate::types::{EventRecord, SourceTag};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5,}").unwrap());

const MAX_UID_SLUG: usize = 60;

/// Normalized title, canonical start and, for vessel calls, a vessel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub title: String,
    pub start: String,
    pub vessel: Option<String>,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.title, self.start)?;
        if let Some(vessel) = &self.vessel {
            write!(f, "|{}", vessel)?;
        }
        Ok(())
    }
}

/// Lower case, punctuation removed, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Vessel id for schedule records: the numeric id in the reference link,
/// else a slug of the vessel name.
fn vessel_id(record: &EventRecord) -> Option<String> {
    if record.source_tag != SourceTag::ScheduleSource {
        return None;
    }
    let from_link = record
        .detail_url
        .as_deref()
        .and_then(|url| DIGIT_RUN.find_iter(url).last())
        .map(|m| m.as_str().to_string());
    Some(from_link.unwrap_or_else(|| slugify(&record.title)))
}

pub fn key(record: &EventRecord) -> IdentityKey {
    IdentityKey {
        title: normalize_title(&record.title),
        start: record.start.canonical(),
        vessel: vessel_id(record),
    }
}

/// Keeps the first record for each key, in input order.
pub fn dedup(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(key(record)))
        .collect()
}

/// `<title-slug>-<start-stamp>-<uuid-v5 of key>@<domain>`
pub fn uid(record: &EventRecord, domain: &str) -> String {
    let mut slug = slugify(&record.title);
    if slug.len() > MAX_UID_SLUG {
        slug.truncate(MAX_UID_SLUG);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    if slug.is_empty() {
        slug.push_str("event");
    }
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, key(record).to_string().as_bytes());
    format!("{}-{}-{}@{}", slug, record.start.stamp(), id, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::Category;
    use crate::types::TemporalValue;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn record(title: &str, day: u32, source_tag: SourceTag, detail_url: Option<&str>) -> EventRecord {
        let start = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        EventRecord {
            title: title.to_string(),
            start: TemporalValue::Date(start),
            end: TemporalValue::Date(start.succ_opt().unwrap()),
            location: "Cobh".to_string(),
            source_tag,
            tags: BTreeSet::new(),
            detail_url: detail_url.map(str::to_string),
            notes: None,
            category: Category::General,
        }
    }

    #[test]
    fn titles_normalize_case_and_punctuation() {
        assert_eq!(normalize_title("  Community   Market! "), "community market");
        assert_eq!(normalize_title("Trad-Session @ Kelly's"), "trad session kelly s");
    }

    #[test]
    fn same_title_and_start_collapse_to_first() {
        let mut first = record("Community Market", 14, SourceTag::ListingSource, None);
        first.notes = Some("first".into());
        let mut second = record("community market!", 14, SourceTag::ListingSource, None);
        second.notes = Some("second".into());
        let other_day = record("Community Market", 21, SourceTag::ListingSource, None);

        let kept = dedup(vec![first, second, other_day]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].notes.as_deref(), Some("first"));
        assert_eq!(kept[1].start, TemporalValue::Date(NaiveDate::from_ymd_opt(2026, 3, 21).unwrap()));
    }

    #[test]
    fn vessel_records_key_on_link_id_then_name() {
        let linked = record(
            "Celebrity Apex",
            14,
            SourceTag::ScheduleSource,
            Some("https://www.portofcork.ie/vessel.php?imo=9788881"),
        );
        assert_eq!(key(&linked).vessel.as_deref(), Some("9788881"));

        let unlinked = record("Celebrity Apex", 14, SourceTag::ScheduleSource, None);
        assert_eq!(key(&unlinked).vessel.as_deref(), Some("celebrity-apex"));
        assert_ne!(key(&linked), key(&unlinked));

        let listing = record("Celebrity Apex", 14, SourceTag::ListingSource, None);
        assert_eq!(key(&listing).vessel, None);
    }

    #[test]
    fn uid_is_stable_and_readable() {
        let r = record("Community Market", 14, SourceTag::ListingSource, None);
        let a = uid(&r, "thearchcobh");
        let b = uid(&r.clone(), "thearchcobh");
        assert_eq!(a, b);
        assert!(a.starts_with("community-market-20260314T0000-"));
        assert!(a.ends_with("@thearchcobh"));

        let long = record(&"very long title ".repeat(10), 14, SourceTag::ListingSource, None);
        let slug = uid(&long, "x").split("-2026").next().unwrap().to_string();
        assert!(slug.len() <= MAX_UID_SLUG);
        assert!(!slug.ends_with('-'));
    }
}
