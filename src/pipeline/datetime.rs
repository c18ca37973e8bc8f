//! Turns loose date and time text into normalized [`TimeSpan`]s.
//!
//! Sources disagree on whether they provide a time of day. An event with no
//! usable time becomes an all-day span of dates with an exclusive end, one
//! with a time becomes a pair of instants in the configured timezone. The two
//! kinds are never mixed inside one span.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TimeConfig;
use crate::constants::MIDNIGHT_SPELLINGS;
use crate::error::{Result, ScraperError};
use crate::types::{TemporalValue, TimeSpan};

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4}|\d{2})\b").unwrap());
static CLOCK_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{1,2}[:.]\d{2}(?::\d{2})?(?:\s*[ap]\.?m\.?)?|\b\d{1,2}\s*[ap]\.?m\.?").unwrap()
});
static TIME_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?$").unwrap()
});
static RANGE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:-|to|until)\s+|\s*[–—]\s*").unwrap());
static COMPACT_DAY_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s*-\s*(\d{1,2})(?:st|nd|rd|th)?\b").unwrap()
});
static ORDINAL_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?$").unwrap());

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// How a source expressed the last day of an all-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// The last day the event runs on.
    Inclusive(NaiveDate),
    /// The first day the event no longer runs on.
    Exclusive(NaiveDate),
}

/// Optional explicit end tokens accompanying a start.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndHint<'a> {
    pub date: Option<&'a str>,
    pub time: Option<&'a str>,
}

/// True for an empty time token or one of the midnight spellings.
pub fn is_midnight_token(token: &str) -> bool {
    let token = token.trim();
    token.is_empty()
        || MIDNIGHT_SPELLINGS
            .iter()
            .any(|m| m.eq_ignore_ascii_case(token))
}

/// Parses a time of day such as `19:30`, `7:30 PM`, `7pm` or `noon`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "noon" | "midday" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let caps = TIME_TOKEN.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;

    match caps.get(4) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let pm = meridiem.as_str().to_ascii_lowercase().starts_with('p');
            let hour_24 = match (pm, hour) {
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, 12) => 0,
                (false, h) => h,
            };
            NaiveTime::from_hms_opt(hour_24, minute, second)
        }
        // A bare number is a day or a count, not a time.
        None if caps.get(2).is_none() => None,
        None => NaiveTime::from_hms_opt(hour, minute, second),
    }
}

/// Full month names and their three-letter forms, plus `sept`.
fn month_from_token(token: &str) -> Option<u32> {
    if token.len() < 3 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let token = token.to_ascii_lowercase();
    if token == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| *m == token || m[..3] == token)
        .map(|i| i as u32 + 1)
}

/// First clock time in text that is not part of a numeric date, so the
/// `13.04` in `13.04.2026` is never read as a time.
fn clock_outside_dates(text: &str) -> Option<String> {
    let without_iso = ISO_DATE.replace_all(text, " ");
    let dateless = NUMERIC_DATE.replace_all(&without_iso, " ");
    CLOCK_IN_TEXT.find(&dateless).map(|m| m.as_str().to_string())
}

/// Day, month and year tokens found in free text, times removed first.
#[derive(Debug, Default)]
struct DateParts {
    day: Option<u32>,
    month: Option<u32>,
    year: Option<i32>,
}

impl DateParts {
    /// A month word next to the day number beats one found elsewhere in
    /// the text.
    fn scan(text: &str) -> Self {
        let without_times = CLOCK_IN_TEXT.replace_all(text, " ");
        let tokens: Vec<&str> = without_times
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut parts = DateParts::default();
        let mut day_at = None;
        let mut months: Vec<(usize, u32)> = Vec::new();
        for (idx, token) in tokens.iter().enumerate() {
            if let Some(m) = month_from_token(token) {
                months.push((idx, m));
                continue;
            }
            if parts.year.is_none() && token.len() == 4 {
                if let Ok(y) = token.parse::<i32>() {
                    if (1900..=2100).contains(&y) {
                        parts.year = Some(y);
                        continue;
                    }
                }
            }
            if parts.day.is_none() {
                if let Some(caps) = ORDINAL_DAY.captures(token) {
                    if let Ok(d) = caps[1].parse::<u32>() {
                        if (1..=31).contains(&d) {
                            parts.day = Some(d);
                            day_at = Some(idx);
                        }
                    }
                }
            }
        }

        let adjacent = day_at.and_then(|d| {
            months
                .iter()
                .find(|(idx, _)| idx + 1 == d || *idx == d + 1)
                .map(|(_, m)| *m)
        });
        parts.month = adjacent.or_else(|| months.first().map(|(_, m)| *m));
        parts
    }
}

/// Normalizes raw date/time tokens for one fixed civil timezone.
#[derive(Debug, Clone)]
pub struct DateTimeNormalizer {
    tz: Tz,
    default_duration: Duration,
    min_year: i32,
}

impl DateTimeNormalizer {
    pub fn new(tz: Tz, default_duration: Duration, min_year: i32) -> Self {
        Self {
            tz,
            default_duration,
            min_year,
        }
    }

    pub fn from_config(config: &TimeConfig) -> Self {
        Self::new(config.timezone, config.default_duration(), config.min_year)
    }

    /// Best-effort, day-first date extraction from free text.
    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let date = if let Some(caps) = ISO_DATE.captures(text) {
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
        } else if let Some(caps) = NUMERIC_DATE.captures(text) {
            let year: i32 = caps[3].parse().ok()?;
            let year = if year < 100 { 2000 + year } else { year };
            NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[1].parse().ok()?)
        } else {
            let parts = DateParts::scan(text);
            NaiveDate::from_ymd_opt(parts.year?, parts.month?, parts.day?)
        }?;

        (date.year() >= self.min_year).then_some(date)
    }

    /// Parses a date that may be a range, returning the start and the
    /// inclusive last day when the text names one after the start.
    pub fn parse_date_range(&self, text: &str) -> Option<(NaiveDate, Option<NaiveDate>)> {
        if let Some((left, right)) = split_range(text) {
            if let Some(end) = self.parse_date(right) {
                let start = self
                    .parse_date(left)
                    .or_else(|| self.start_from_context(left, end));
                if let Some(start) = start {
                    return Some((start, (end > start).then_some(end)));
                }
            }
        }

        if !ISO_DATE.is_match(text) && !NUMERIC_DATE.is_match(text) {
            if COMPACT_DAY_RANGE.is_match(text) {
                let start = self.parse_date(&COMPACT_DAY_RANGE.replace(text, "$1"));
                let end = self.parse_date(&COMPACT_DAY_RANGE.replace(text, "$2"));
                if let (Some(start), Some(end)) = (start, end) {
                    return Some((start, (end > start).then_some(end)));
                }
            }
        }

        self.parse_date(text).map(|d| (d, None))
    }

    /// Completes a partial start date ("14", "30 Dec") from its range end.
    fn start_from_context(&self, partial: &str, end: NaiveDate) -> Option<NaiveDate> {
        let parts = DateParts::scan(partial);
        let day = parts.day?;
        let month = parts.month.unwrap_or(end.month());
        let candidate = NaiveDate::from_ymd_opt(end.year(), month, day)?;
        if candidate > end {
            NaiveDate::from_ymd_opt(end.year() - 1, month, day)
        } else {
            Some(candidate)
        }
    }

    /// Places a wall-clock time in the target timezone. Times skipped by a
    /// DST transition move forward an hour; repeated times take the first.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest(),
        }
    }

    /// Parses a single token holding both date and time, such as
    /// `13/04/2026 09:00` or `2026-04-13T09:00:00+01:00`.
    ///
    /// Explicit offsets are converted into the target timezone; naive values
    /// are taken as target-local.
    pub fn parse_instant(&self, text: &str) -> Result<DateTime<Tz>> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&self.tz));
        }
        for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M%z"] {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Ok(dt.with_timezone(&self.tz));
            }
        }
        for fmt in [
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
            "%d.%m.%Y %H:%M:%S",
            "%d.%m.%Y %H:%M",
            "%d-%m-%Y %H:%M:%S",
            "%d-%m-%Y %H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return self
                    .localize(naive)
                    .ok_or_else(|| ScraperError::Parse(format!("Unrepresentable local time: {}", text)));
            }
        }

        let clock = clock_outside_dates(text)
            .ok_or_else(|| ScraperError::Parse(format!("No time of day in '{}'", text)))?;
        let time = parse_time(&clock)
            .ok_or_else(|| ScraperError::Parse(format!("Invalid time '{}'", clock)))?;
        let date = self
            .parse_date(text)
            .ok_or_else(|| ScraperError::Parse(format!("No date in '{}'", text)))?;
        self.localize(date.and_time(time))
            .ok_or_else(|| ScraperError::Parse(format!("Unrepresentable local time: {}", text)))
    }

    /// Parses a structured-metadata value: date-only text (or a midnight
    /// time without a `T` separator) is a date, anything else an instant.
    pub fn parse_temporal(&self, text: &str) -> Option<TemporalValue> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !text.contains('T') {
            let midnight = clock_outside_dates(text)
                .map(|c| parse_time(&c) == NaiveTime::from_hms_opt(0, 0, 0))
                .unwrap_or(true);
            if midnight {
                return self.parse_date(text).map(TemporalValue::Date);
            }
        }
        self.parse_instant(text).ok().map(TemporalValue::Instant)
    }

    /// Normalizes a date token, a time token and optional explicit end
    /// tokens into a span.
    ///
    /// An absent or midnight time yields an all-day span; an explicit end
    /// date is read as inclusive. A present time yields instants, ending after
    /// the default duration unless an end time is given.
    pub fn normalize(&self, date_token: &str, time_token: &str, end: EndHint<'_>) -> Result<TimeSpan> {
        let (start_date, range_end) = self
            .parse_date_range(date_token)
            .ok_or_else(|| ScraperError::Parse(format!("Unparseable date '{}'", date_token)))?;

        let explicit_end_date = match end.date.filter(|d| !d.trim().is_empty()) {
            Some(raw) => Some(
                self.parse_date(raw)
                    .ok_or_else(|| ScraperError::Parse(format!("Unparseable end date '{}'", raw)))?,
            ),
            None => range_end,
        };

        if is_midnight_token(time_token) {
            return Ok(self.all_day(start_date, explicit_end_date.map(DateBound::Inclusive)));
        }

        let start_time = parse_time(time_token)
            .ok_or_else(|| ScraperError::Parse(format!("Unparseable time '{}'", time_token)))?;
        let start = self
            .localize(start_date.and_time(start_time))
            .ok_or_else(|| ScraperError::Parse(format!("Unrepresentable start '{} {}'", date_token, time_token)))?;

        let end_value = match end.time.filter(|t| !is_midnight_token(t)) {
            Some(raw) => {
                let end_time = parse_time(raw)
                    .ok_or_else(|| ScraperError::Parse(format!("Unparseable end time '{}'", raw)))?;
                let day = explicit_end_date.unwrap_or(start_date);
                self.localize(day.and_time(end_time)).map(TemporalValue::Instant)
            }
            None => explicit_end_date.map(TemporalValue::Date),
        };

        Ok(self.reconcile(TemporalValue::Instant(start), end_value))
    }

    /// All-day span with an exclusive end. An end that is not after the
    /// start collapses to a single day.
    pub fn all_day(&self, start: NaiveDate, end: Option<DateBound>) -> TimeSpan {
        let one_day = start + Duration::days(1);
        let end = match end {
            Some(DateBound::Inclusive(last)) if last > start => last + Duration::days(1),
            Some(DateBound::Exclusive(after)) if after > start => after,
            _ => one_day,
        };
        TimeSpan {
            start: TemporalValue::Date(start),
            end: TemporalValue::Date(end),
        }
    }

    /// Timed span; a missing end, or one not after the start, becomes
    /// start plus the default duration.
    pub fn timed(&self, start: DateTime<Tz>, end: Option<DateTime<Tz>>) -> TimeSpan {
        let end = end
            .filter(|e| *e > start)
            .unwrap_or(start + self.default_duration);
        TimeSpan {
            start: TemporalValue::Instant(start),
            end: TemporalValue::Instant(end),
        }
    }

    /// Builds a span from independently sourced endpoints. Date ends are
    /// inclusive; a date paired with an instant downgrades the instant to its
    /// date so both endpoints are dates.
    pub fn reconcile(&self, start: TemporalValue, end: Option<TemporalValue>) -> TimeSpan {
        match (start, end) {
            (TemporalValue::Instant(s), None) => self.timed(s, None),
            (TemporalValue::Instant(s), Some(TemporalValue::Instant(e))) => self.timed(s, Some(e)),
            (start, Some(end)) => {
                self.all_day(start.date(), Some(DateBound::Inclusive(end.date())))
            }
            (TemporalValue::Date(s), None) => self.all_day(s, None),
        }
    }
}

fn split_range(text: &str) -> Option<(&str, &str)> {
    let m = RANGE_SEPARATOR.find(text)?;
    let (left, right) = (&text[..m.start()], &text[m.end()..]);
    (!left.trim().is_empty() && !right.trim().is_empty()).then_some((left, right))
}
