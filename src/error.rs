use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch of {url} failed with status {status}")]
    Fetch { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unrecognized page structure: {0}")]
    Structure(String),

    #[error("No events generated from any source")]
    NoEvents,
}

impl ScraperError {
    /// True for network and HTTP status failures.
    pub fn is_fetch(&self) -> bool {
        matches!(self, ScraperError::Http(_) | ScraperError::Fetch { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
