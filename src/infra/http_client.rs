use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER};
use reqwest::StatusCode;
use tracing::debug;

use crate::app::ports::PageFetcher;
use crate::config::HttpConfig;
use crate::error::{Result, ScraperError};

/// Browser-like page fetcher.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-IE,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer)
                .map_err(|e| ScraperError::Config(format!("Invalid http.referer: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<(StatusCode, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let (mut status, mut body) = self.get(url).await?;
        let mut final_url = url.to_string();

        // some servers answer 415 for paths missing their trailing slash
        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            if let Some(retry_url) = with_trailing_slash(url) {
                debug!("Got 415 for {}, retrying as {}", url, retry_url);
                (status, body) = self.get(&retry_url).await?;
                final_url = retry_url;
            }
        }

        if !status.is_success() {
            return Err(ScraperError::Fetch {
                url: final_url,
                status: status.as_u16(),
            });
        }
        Ok(body)
    }
}

/// The URL with `/` appended to its path, or `None` if it already ends in
/// one. Query and fragment are kept.
fn with_trailing_slash(url: &str) -> Option<String> {
    let mut parsed = reqwest::Url::parse(url).ok()?;
    if parsed.path().ends_with('/') {
        return None;
    }
    let path = format!("{}/", parsed.path());
    parsed.set_path(&path);
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_added_before_query() {
        assert_eq!(
            with_trailing_slash("https://incobh.com/events?etype=upcoming").as_deref(),
            Some("https://incobh.com/events/?etype=upcoming")
        );
        assert_eq!(with_trailing_slash("https://incobh.com/events/"), None);
        assert_eq!(with_trailing_slash("not a url"), None);
    }

    #[test]
    fn builds_with_default_config() {
        assert!(ReqwestFetcher::new(&HttpConfig::default()).is_ok());
    }
}
