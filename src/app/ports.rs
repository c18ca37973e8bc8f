use async_trait::async_trait;

use crate::error::Result;
use crate::types::EventRecord;

/// Fetches a page body as text. Non-success statuses surface as
/// `ScraperError::Fetch`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Accepts normalized records and persists them at the end of a run.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &EventRecord) -> Result<()>;
    async fn finish(&self) -> Result<usize>;
}
