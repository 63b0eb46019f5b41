//! The Shelfscout retail toolset.
//!
//! This crate provides the fixed set of capabilities the chat model may
//! invoke: the canonical product fetch, video/web search, social-thread
//! scraping, transcript retrieval, and the two composite operations for
//! candidate ranking and candidate expansion.
//!
//! Tools are registered explicitly as handler objects in a [`ToolRegistry`];
//! [`RetailToolHost`] dispatches calls by name and implements the runtime's
//! `ToolHost` boundary, so execution failures surface as error-flagged
//! payloads rather than crashing the chat turn.

mod executor;
mod expand;
mod handlers;
pub mod providers;
mod rank;
mod registry;

pub use executor::RetailToolHost;
pub use expand::{
    PAGE_EXCERPT_CHARS, Selection, SourceFetcher, THREAD_EXCERPT_CHARS, TRANSCRIPT_EXCERPT_CHARS,
    Transcript, TranscriptSegment, expand_selections,
};
pub use handlers::{
    ExpandSelectedSources, FetchProductDetails, FetchYoutubeTranscript, GoogleSearch, RedditScrape,
    SummarizeSearchHits, YoutubeSearch,
};
pub use rank::{DEFAULT_MAX_RESULTS, HitKind, RankedHit, SearchHit, rank_hits};
pub use registry::{ToolHandler, ToolRegistry};

use providers::{ScrapeClient, SearchClient, WebFetcher, YoutubeClient};
use std::sync::{Arc, Mutex};
use storage::ProductStore;

/// Wire up the full retail toolset against live collaborators.
pub fn standard_host(
    catalog: Arc<Mutex<ProductStore>>,
    youtube: Arc<YoutubeClient>,
    search: Arc<SearchClient>,
    scrape: Arc<ScrapeClient>,
) -> RetailToolHost {
    let fetcher = Arc::new(WebFetcher::new(Arc::clone(&youtube), scrape.clone()));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FetchProductDetails::new(catalog)));
    registry.register(Arc::new(YoutubeSearch::new(Arc::clone(&youtube))));
    registry.register(Arc::new(GoogleSearch::new(search)));
    registry.register(Arc::new(RedditScrape::new(scrape)));
    registry.register(Arc::new(FetchYoutubeTranscript::new(youtube)));
    registry.register(Arc::new(SummarizeSearchHits));
    registry.register(Arc::new(ExpandSelectedSources::new(fetcher)));
    RetailToolHost::new(registry)
}
