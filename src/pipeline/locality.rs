//! Decides whether a candidate event belongs to the target place.

use crate::config::PlaceConfig;
use crate::pipeline::text::LineScan;
use crate::types::LocalitySignal;

#[derive(Debug, Clone)]
pub struct LocalityResolver {
    target: String,
    known_places: Vec<String>,
}

impl LocalityResolver {
    pub fn new(target: impl Into<String>, known_places: Vec<String>) -> Self {
        Self {
            target: target.into(),
            known_places,
        }
    }

    pub fn from_config(config: &PlaceConfig) -> Self {
        Self::new(config.target.clone(), config.known_places.clone())
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// First line that is exactly one of the known place names.
    pub fn first_place_token<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Option<&'a str> {
        LineScan::new(lines).first(|line| self.known_places.iter().any(|p| p == line))
    }

    /// Listing-text signal, anchored to the first place token only.
    pub fn weak_signal<S: AsRef<str>>(&self, lines: &[S]) -> LocalitySignal {
        match self.first_place_token(lines) {
            Some(place) if place == self.target => LocalitySignal::Confirmed(place.to_string()),
            Some(place) => LocalitySignal::Rejected(place.to_string()),
            None => LocalitySignal::Unknown,
        }
    }

    /// Signal from a structured locality field; empty means no field.
    pub fn signal_from_metadata(&self, locality: Option<&str>) -> LocalitySignal {
        match locality.map(str::trim).filter(|l| !l.is_empty()) {
            Some(l) if l.eq_ignore_ascii_case(&self.target) => LocalitySignal::Confirmed(l.to_string()),
            Some(l) => LocalitySignal::Rejected(l.to_string()),
            None => LocalitySignal::Unknown,
        }
    }

    /// A known detail signal decides alone; otherwise the listing's first
    /// place token must be the target.
    pub fn resolve<S: AsRef<str>>(&self, listing_lines: &[S], detail: &LocalitySignal) -> bool {
        match detail {
            LocalitySignal::Confirmed(_) => true,
            LocalitySignal::Rejected(_) => false,
            LocalitySignal::Unknown => {
                matches!(self.weak_signal(listing_lines), LocalitySignal::Confirmed(_))
            }
        }
    }
}
