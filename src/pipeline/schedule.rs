//! Cruise schedule tables.
//!
//! The schedule page repeats a header row per month section, with a
//! one-cell month label above it. Headers are found by content and each one
//! rebuilds the column map used for the rows below it.

use std::collections::HashMap;

use chrono::DateTime;
use chrono_tz::Tz;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::config::ScheduleConfig;
use crate::error::{Result, ScraperError};
use crate::pipeline::datetime::DateTimeNormalizer;
use crate::pipeline::text::{absolute_link, clean_line, has_year};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
    Vessel,
    Berth,
    Arrival,
    Departure,
    Passengers,
    Operator,
    VesselLink,
}

impl ColumnField {
    pub const ALL: [ColumnField; 7] = [
        ColumnField::Vessel,
        ColumnField::Berth,
        ColumnField::Arrival,
        ColumnField::Departure,
        ColumnField::Passengers,
        ColumnField::Operator,
        ColumnField::VesselLink,
    ];

    pub const REQUIRED: [ColumnField; 4] = [
        ColumnField::Vessel,
        ColumnField::Berth,
        ColumnField::Arrival,
        ColumnField::Departure,
    ];

    /// Lower-case substrings that identify the field's header cell.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ColumnField::Vessel => &["vessel"],
            ColumnField::Berth => &["berth"],
            ColumnField::Arrival => &["arrival"],
            ColumnField::Departure => &["departure"],
            ColumnField::Passengers => &["pax", "passenger"],
            ColumnField::Operator => &["line", "operator"],
            ColumnField::VesselLink => &["imo"],
        }
    }

    fn matches(&self, header_text: &str) -> bool {
        let lower = header_text.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }
}

/// Field to column position for one header section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    positions: HashMap<ColumnField, usize>,
}

impl ColumnMap {
    /// Maps each field to the first header cell mentioning it. `None` if a
    /// required field has no column.
    pub fn from_header<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        let positions: HashMap<_, _> = ColumnField::ALL
            .iter()
            .filter_map(|field| {
                cells
                    .iter()
                    .position(|c| field.matches(c.as_ref()))
                    .map(|idx| (*field, idx))
            })
            .collect();

        ColumnField::REQUIRED
            .iter()
            .all(|f| positions.contains_key(f))
            .then_some(Self { positions })
    }

    pub fn get(&self, field: ColumnField) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    /// Cells a data row needs to cover every required column.
    pub fn min_cells(&self) -> usize {
        ColumnField::REQUIRED
            .iter()
            .filter_map(|f| self.get(*f))
            .max()
            .map_or(0, |idx| idx + 1)
    }
}

/// A single cell holding a year, e.g. "April 2026".
pub fn is_section_label<S: AsRef<str>>(cells: &[S]) -> bool {
    cells.len() == 1 && has_year(cells[0].as_ref())
}

/// Every required keyword appears somewhere in the row.
pub fn is_header_row<S: AsRef<str>>(cells: &[S]) -> bool {
    let joined = cells
        .iter()
        .map(|c| c.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    ColumnField::REQUIRED
        .iter()
        .all(|f| f.keywords().iter().any(|k| joined.contains(k)))
}

/// One retained schedule row.
#[derive(Debug, Clone, PartialEq)]
pub struct CruiseCall {
    pub vessel: String,
    pub berth: String,
    pub arrival: DateTime<Tz>,
    pub departure: DateTime<Tz>,
    pub passengers: Option<u32>,
    pub operator: Option<String>,
    /// Numeric identifier from the vessel-id cell text.
    pub vessel_id: Option<String>,
    pub reference_link: Option<String>,
}

/// Rows kept plus counts of rows skipped for each reason.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleParse {
    pub calls: Vec<CruiseCall>,
    pub other_berth: usize,
    pub unparseable: usize,
}

pub struct ScheduleTableParser {
    normalizer: DateTimeNormalizer,
    target_berth: String,
    link_authority: String,
    table_selector: Selector,
    row_selector: Selector,
    link_selector: Selector,
}

impl ScheduleTableParser {
    pub fn new(normalizer: DateTimeNormalizer, config: &ScheduleConfig) -> Self {
        Self {
            normalizer,
            target_berth: config.target_berth.clone(),
            link_authority: config.link_authority.clone(),
            table_selector: Selector::parse("table").unwrap(),
            row_selector: Selector::parse("tr").unwrap(),
            link_selector: Selector::parse("a[href]").unwrap(),
        }
    }

    /// Parses every table on the page. Tables without a header row are
    /// skipped; if no table has one the page structure is unknown and
    /// nothing can be read.
    pub fn parse(&self, html: &str) -> Result<ScheduleParse> {
        let document = Html::parse_document(html);
        let mut out = ScheduleParse::default();
        let mut tables_seen = 0;
        let mut headers_seen = 0;

        for table in document.select(&self.table_selector) {
            tables_seen += 1;
            let mut columns: Option<ColumnMap> = None;

            for row in table.select(&self.row_selector) {
                // rows of nested tables are read with their own table
                let owner = row
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|e| e.value().name() == "table");
                if owner.map(|t| t.id()) != Some(table.id()) {
                    continue;
                }
                if row.select(&self.table_selector).next().is_some() {
                    continue;
                }
                let cells: Vec<ElementRef<'_>> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .collect();
                let texts: Vec<String> = cells
                    .iter()
                    .map(|c| clean_line(&c.text().collect::<String>()))
                    .collect();
                if texts.is_empty() || is_section_label(&texts) {
                    continue;
                }
                if is_header_row(&texts) {
                    headers_seen += 1;
                    columns = ColumnMap::from_header(&texts);
                    if columns.is_none() {
                        debug!("Header row without required columns: {:?}", texts);
                    }
                    continue;
                }

                let Some(map) = columns.as_ref() else {
                    continue;
                };
                if texts.len() < map.min_cells() {
                    continue;
                }
                self.read_row(map, &cells, &texts, &mut out);
            }
        }

        if headers_seen == 0 {
            return Err(ScraperError::Structure(format!(
                "no schedule header row in {} table(s)",
                tables_seen
            )));
        }
        Ok(out)
    }

    fn read_row(&self, map: &ColumnMap, cells: &[ElementRef<'_>], texts: &[String], out: &mut ScheduleParse) {
        let cell = |field: ColumnField| map.get(field).and_then(|i| texts.get(i)).map(String::as_str);

        let berth = cell(ColumnField::Berth).unwrap_or_default();
        if berth != self.target_berth {
            out.other_berth += 1;
            return;
        }
        let vessel = cell(ColumnField::Vessel).unwrap_or_default().to_string();

        let arrival = cell(ColumnField::Arrival).unwrap_or_default();
        let departure = cell(ColumnField::Departure).unwrap_or_default();
        let (arrival, departure) = match (
            self.normalizer.parse_instant(arrival),
            self.normalizer.parse_instant(departure),
        ) {
            (Ok(a), Ok(d)) => (a, d),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Dropping schedule row for '{}': {}", vessel, e);
                out.unparseable += 1;
                return;
            }
        };

        let passengers = cell(ColumnField::Passengers).and_then(digits_only).and_then(|d| d.parse().ok());
        let operator = cell(ColumnField::Operator)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
        let vessel_id = cell(ColumnField::VesselLink).and_then(digits_only);
        let reference_link = map
            .get(ColumnField::VesselLink)
            .and_then(|i| cells.get(i))
            .and_then(|c| c.select(&self.link_selector).next())
            .and_then(|a| a.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .map(|href| absolute_link(&self.link_authority, href));

        out.calls.push(CruiseCall {
            vessel,
            berth: berth.to_string(),
            arrival,
            departure,
            passengers,
            operator,
            vessel_id,
            reference_link,
        });
    }
}

/// The digits of a cell, or `None` if it has none ("4,200" -> "4200").
fn digits_only(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}
