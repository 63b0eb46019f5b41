//! Adapters for the external collaborators the tools call into.

mod scrape;
mod search;
mod youtube;

pub use scrape::ScrapeClient;
pub use search::{DEFAULT_SEARCH_RESULTS as DEFAULT_WEB_RESULTS, SearchClient, WebHit};
pub use youtube::{
    DEFAULT_SEARCH_RESULTS as DEFAULT_VIDEO_RESULTS, VideoHit, YoutubeClient, guess_language,
};

use std::sync::Arc;

use async_trait::async_trait;
use runtime::ToolError;

use crate::expand::{SourceFetcher, Transcript};

/// Production [`SourceFetcher`] combining the video and scrape clients.
pub struct WebFetcher {
    youtube: Arc<YoutubeClient>,
    scrape: Arc<ScrapeClient>,
}

impl WebFetcher {
    pub fn new(youtube: Arc<YoutubeClient>, scrape: Arc<ScrapeClient>) -> Self {
        Self { youtube, scrape }
    }
}

#[async_trait]
impl SourceFetcher for WebFetcher {
    async fn transcript(&self, video_id: &str) -> Result<Transcript, ToolError> {
        self.youtube.transcript(video_id).await
    }

    async fn thread_text(&self, url: &str) -> Result<String, ToolError> {
        self.scrape.thread_text(url).await
    }

    async fn page_text(&self, url: &str) -> Result<String, ToolError> {
        self.scrape.page_text(url).await
    }
}
