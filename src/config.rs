use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Result, ScraperError};
use crate::types::PassengerTier;

/// Run configuration. Every section is optional in the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub place: PlaceConfig,
    pub time: TimeConfig,
    pub listing: ListingConfig,
    pub schedule: ScheduleConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaceConfig {
    /// The place whose events are kept.
    pub target: String,
    /// Place names recognised as standalone lines in listing blocks.
    pub known_places: Vec<String>,
}

impl Default for PlaceConfig {
    fn default() -> Self {
        Self {
            target: constants::DEFAULT_TARGET_PLACE.to_string(),
            known_places: constants::DEFAULT_KNOWN_PLACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub timezone: Tz,
    pub default_duration_minutes: i64,
    /// Dates parsed from free text before this year are treated as noise.
    pub min_year: i32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Dublin,
            default_duration_minutes: constants::DEFAULT_EVENT_DURATION_MINUTES,
            min_year: constants::DEFAULT_MIN_YEAR,
        }
    }
}

impl TimeConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::minutes(self.default_duration_minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub first_page_url: String,
    /// Template for pages 2..; must contain `{page}`.
    pub paged_url: String,
    pub heading_tag: String,
    pub max_pages: u32,
    pub location_label: String,
    pub event_dates_label: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            first_page_url: constants::INCOBH_FIRST_PAGE_URL.to_string(),
            paged_url: constants::INCOBH_PAGED_URL.to_string(),
            heading_tag: "h3".to_string(),
            max_pages: constants::DEFAULT_MAX_PAGES,
            location_label: constants::LOCATION_LABEL.to_string(),
            event_dates_label: constants::EVENT_DATES_LABEL.to_string(),
        }
    }
}

impl ListingConfig {
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            self.first_page_url.clone()
        } else {
            self.paged_url.replace("{page}", &page.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub url: String,
    /// Rows are kept only when the berth cell equals this exactly.
    pub target_berth: String,
    /// Prefixed to reference links that arrive as bare paths.
    pub link_authority: String,
    pub passenger_tiers: PassengerTiers,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            url: constants::PORT_OF_CORK_SCHEDULE_URL.to_string(),
            target_berth: constants::DEFAULT_TARGET_BERTH.to_string(),
            link_authority: constants::PORT_OF_CORK_AUTHORITY.to_string(),
            passenger_tiers: PassengerTiers::default(),
        }
    }
}

/// Lower bounds (inclusive) of the medium and large passenger tiers.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PassengerTiers {
    pub medium: u32,
    pub large: u32,
}

impl Default for PassengerTiers {
    fn default() -> Self {
        Self {
            medium: 1500,
            large: 3000,
        }
    }
}

impl PassengerTiers {
    pub fn tier_for(&self, passengers: u32) -> PassengerTier {
        if passengers >= self.large {
            PassengerTier::Large
        } else if passengers >= self.medium {
            PassengerTier::Medium
        } else {
            PassengerTier::Small
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub referer: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: constants::BROWSER_USER_AGENT.to_string(),
            referer: constants::DEFAULT_REFERER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub calendar_name: String,
    pub uid_domain: String,
    pub creator_line: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output/cobh-events.ndjson"),
            calendar_name: constants::DEFAULT_CALENDAR_NAME.to_string(),
            uid_domain: constants::DEFAULT_UID_DOMAIN.to_string(),
            creator_line: constants::CREATOR_LINE.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listing.max_pages == 0 {
            return Err(ScraperError::Config(
                "listing.max_pages must be at least 1".into(),
            ));
        }
        if !self.listing.paged_url.contains("{page}") {
            return Err(ScraperError::Config(
                "listing.paged_url must contain a {page} placeholder".into(),
            ));
        }
        if self.time.default_duration_minutes <= 0 {
            return Err(ScraperError::Config(
                "time.default_duration_minutes must be positive".into(),
            ));
        }
        let tiers = &self.schedule.passenger_tiers;
        if tiers.medium > tiers.large {
            return Err(ScraperError::Config(format!(
                "schedule.passenger_tiers out of order: medium {} > large {}",
                tiers.medium, tiers.large
            )));
        }
        if self.place.target.trim().is_empty() {
            return Err(ScraperError::Config("place.target must not be empty".into()));
        }
        if !self.place.known_places.iter().any(|p| p == &self.place.target) {
            return Err(ScraperError::Config(format!(
                "place.known_places must include the target '{}'",
                self.place.target
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.place.target, "Cobh");
        assert_eq!(config.time.timezone, chrono_tz::Europe::Dublin);
        assert_eq!(config.time.default_duration(), Duration::hours(2));
        assert_eq!(config.listing.max_pages, 20);
        assert_eq!(config.schedule.target_berth, "Cobh Cruise Terminal");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [place]
            target = "Kinsale"
            known_places = ["Kinsale", "Cork"]

            [time]
            timezone = "Europe/London"
            default_duration_minutes = 90

            [schedule.passenger_tiers]
            medium = 500
            large = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.place.target, "Kinsale");
        assert_eq!(config.time.timezone, chrono_tz::Europe::London);
        assert_eq!(config.time.default_duration(), Duration::minutes(90));
        assert_eq!(config.schedule.passenger_tiers.tier_for(2000), PassengerTier::Large);
        assert_eq!(config.schedule.passenger_tiers.tier_for(499), PassengerTier::Small);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_toml_str("[listing]\nmax_pages = 0").is_err());
        assert!(Config::from_toml_str("[listing]\npaged_url = \"https://x/2\"").is_err());
        assert!(Config::from_toml_str("[time]\ndefault_duration_minutes = 0").is_err());
        assert!(Config::from_toml_str("[time]\ntimezone = \"Mars/Olympus\"").is_err());
        assert!(
            Config::from_toml_str("[schedule.passenger_tiers]\nmedium = 4000\nlarge = 3000")
                .is_err()
        );
    }

    #[test]
    fn target_must_be_a_known_place() {
        let err = Config::from_toml_str(
            "[place]\ntarget = \"Kinsale\"\nknown_places = [\"Cobh\", \"Cork\"]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Kinsale"));
        assert!(Config::from_toml_str("[place]\ntarget = \"Cobh\"\nknown_places = [\"cobh\"]").is_err());
    }

    #[test]
    fn page_urls_follow_template() {
        let listing = ListingConfig::default();
        assert_eq!(listing.page_url(1), constants::INCOBH_FIRST_PAGE_URL);
        assert_eq!(
            listing.page_url(3),
            "https://incobh.com/events/page/3/?etype=upcoming"
        );
    }
}
