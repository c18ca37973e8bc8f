/// Source name constants to keep log fields and CLI names consistent

// User-friendly source names (used in CLI and logs)
pub const LISTING_SOURCE: &str = "incobh";
pub const SCHEDULE_SOURCE: &str = "port_of_cork";

// Default endpoints
pub const INCOBH_FIRST_PAGE_URL: &str = "https://incobh.com/events/?etype=upcoming";
pub const INCOBH_PAGED_URL: &str = "https://incobh.com/events/page/{page}/?etype=upcoming";
pub const PORT_OF_CORK_SCHEDULE_URL: &str = "https://www.portofcork.ie/print-cruise-schedule.php";
pub const PORT_OF_CORK_AUTHORITY: &str = "https://www.portofcork.ie";

// Place defaults
pub const DEFAULT_TARGET_PLACE: &str = "Cobh";
pub const DEFAULT_KNOWN_PLACES: &[&str] = &["Cobh", "Cork"];
pub const DEFAULT_TARGET_BERTH: &str = "Cobh Cruise Terminal";

pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 120;
pub const DEFAULT_MAX_PAGES: u32 = 20;
pub const DEFAULT_MIN_YEAR: i32 = 2020;

/// Time spellings that mean "no time of day" in the sources.
pub const MIDNIGHT_SPELLINGS: &[&str] = &["00:00", "00:00:00", "12:00 AM", "12:00:00 AM"];

// Detail page section labels used when structured metadata is absent
pub const LOCATION_LABEL: &str = "Location";
pub const EVENT_DATES_LABEL: &str = "Event Dates";

// Emission
pub const DEFAULT_CALENDAR_NAME: &str = "Cobh Events (The Arch)";
pub const DEFAULT_UID_DOMAIN: &str = "thearchcobh";
pub const CREATOR_LINE: &str = "Created by The Arch, Cobh";
pub const LISTING_ATTRIBUTION: &str = "Data from InCobh.com";
pub const SCHEDULE_ATTRIBUTION: &str = "Data from the Port of Cork cruise schedule";
pub const SHEET_ATTRIBUTION: &str = "Data from The Arch";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://incobh.com/";
