#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cobh_events::app::ports::PageFetcher;
use cobh_events::config::Config;
use cobh_events::error::{Result, ScraperError};

/// Serves canned pages by URL and records every request. Unknown URLs
/// answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| ScraperError::Fetch {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub const LISTING_PAGE_1: &str = "https://incobh.test/events/";
pub const SCHEDULE_PAGE: &str = "https://port.test/schedule";

pub fn listing_page(n: u32) -> String {
    format!("https://incobh.test/events/page/{}/", n)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.listing.first_page_url = LISTING_PAGE_1.to_string();
    config.listing.paged_url = "https://incobh.test/events/page/{page}/".to_string();
    config.listing.max_pages = 5;
    config.schedule.url = SCHEDULE_PAGE.to_string();
    config
}

/// A listing page with one linked h3 per event, followed by its
/// `|`-separated lines as paragraphs.
pub fn listing_html(events: &[(&str, &str, &str)]) -> String {
    let mut html = String::from("<html><body><div class=\"events\">");
    for (title, href, lines) in events {
        html.push_str(&format!("<h3><a href=\"{}\">{}</a></h3>", href, title));
        for line in lines.split('|') {
            html.push_str(&format!("<p>{}</p>", line));
        }
    }
    html.push_str("</div></body></html>");
    html
}
