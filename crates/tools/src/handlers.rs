//! Handler implementations for the retail toolset.
//!
//! Each handler owns its collaborators and declares its own call schema;
//! argument validation happens here so upstream clients only ever see
//! [`ToolError`] variants, never panics.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use runtime::{ToolError, ToolSpec};
use serde_json::{Value, json};
use storage::ProductStore;

use crate::expand::{Selection, SourceFetcher, expand_selections};
use crate::providers::{ScrapeClient, SearchClient, YoutubeClient};
use crate::rank::{DEFAULT_MAX_RESULTS, SearchHit, rank_hits};
use crate::registry::ToolHandler;

// ─────────────────────────────────────────────────────────────────────────────
// Argument helpers
// ─────────────────────────────────────────────────────────────────────────────

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required argument: {key}")))
}

/// Read an optional count, accepting camelCase and snake_case spellings.
fn opt_count(args: &Value, default: u32) -> u32 {
    args.get("maxResults")
        .or_else(|| args.get("max_results"))
        .and_then(Value::as_u64)
        .map(|n| n as u32)
        .unwrap_or(default)
}

// ─────────────────────────────────────────────────────────────────────────────
// fetch_product_details
// ─────────────────────────────────────────────────────────────────────────────

/// The canonical catalog lookup. When a chat turn carries product context,
/// this must run before any research tool.
pub struct FetchProductDetails {
    store: Arc<Mutex<ProductStore>>,
}

impl FetchProductDetails {
    pub fn new(store: Arc<Mutex<ProductStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for FetchProductDetails {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "fetch_product_details".into(),
            description: "Fetch the canonical catalog record for a product. \
                          Call this first whenever a product is in context."
                .into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "string",
                        "description": "Catalog identifier of the product"
                    }
                },
                "required": ["product_id"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let product_id = require_str(&args, "product_id")?;
        let product = {
            let store = self
                .store
                .lock()
                .map_err(|_| ToolError::Execution("catalog lock poisoned".into()))?;
            store
                .get(product_id)
                .map_err(|e| ToolError::Execution(e.to_string()))?
        };
        match product {
            Some(product) => serde_json::to_value(product)
                .map_err(|e| ToolError::Execution(e.to_string())),
            None => Err(ToolError::Execution(format!(
                "product {product_id} not found"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// youtube_search
// ─────────────────────────────────────────────────────────────────────────────

pub struct YoutubeSearch {
    youtube: Arc<YoutubeClient>,
}

impl YoutubeSearch {
    pub fn new(youtube: Arc<YoutubeClient>) -> Self {
        Self { youtube }
    }
}

#[async_trait]
impl ToolHandler for YoutubeSearch {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "youtube_search".into(),
            description: "Search YouTube for review and hands-on videos.".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "maxResults": {
                        "type": "integer",
                        "description": "Maximum number of videos to return"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let query = require_str(&args, "query")?;
        let max_results = opt_count(&args, crate::providers::DEFAULT_VIDEO_RESULTS);
        let hits = self.youtube.search(query, max_results).await?;
        Ok(json!({ "results": hits }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// google_search
// ─────────────────────────────────────────────────────────────────────────────

pub struct GoogleSearch {
    search: Arc<SearchClient>,
}

impl GoogleSearch {
    pub fn new(search: Arc<SearchClient>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl ToolHandler for GoogleSearch {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "google_search".into(),
            description: "Search the web for articles, reviews, and discussion threads.".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "maxResults": {
                        "type": "integer",
                        "description": "Maximum number of results to return"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let query = require_str(&args, "query")?;
        let max_results = opt_count(&args, crate::providers::DEFAULT_WEB_RESULTS);
        let hits = self.search.search(query, max_results).await?;
        Ok(json!({ "results": hits }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// reddit_scrape
// ─────────────────────────────────────────────────────────────────────────────

pub struct RedditScrape {
    scrape: Arc<ScrapeClient>,
}

impl RedditScrape {
    pub fn new(scrape: Arc<ScrapeClient>) -> Self {
        Self { scrape }
    }
}

#[async_trait]
impl ToolHandler for RedditScrape {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "reddit_scrape".into(),
            description: "Fetch the full text of a reddit thread, including comments.".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "reddit_url": {
                        "type": "string",
                        "description": "URL of the reddit thread"
                    }
                },
                "required": ["reddit_url"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let url = require_str(&args, "reddit_url")?;
        let text = self.scrape.thread_text(url).await?;
        Ok(json!({ "scraped_data": text }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// fetch_youtube_transcript
// ─────────────────────────────────────────────────────────────────────────────

pub struct FetchYoutubeTranscript {
    youtube: Arc<YoutubeClient>,
}

impl FetchYoutubeTranscript {
    pub fn new(youtube: Arc<YoutubeClient>) -> Self {
        Self { youtube }
    }
}

#[async_trait]
impl ToolHandler for FetchYoutubeTranscript {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "fetch_youtube_transcript".into(),
            description: "Fetch the full transcript of a YouTube video.".into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "video_id": {
                        "type": "string",
                        "description": "YouTube video id"
                    }
                },
                "required": ["video_id"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let video_id = require_str(&args, "video_id")?;
        let transcript = self.youtube.transcript(video_id).await?;
        serde_json::to_value(transcript).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// summarize_search_hits
// ─────────────────────────────────────────────────────────────────────────────

/// Pure relevance ranking over previously-returned search hits. No network.
pub struct SummarizeSearchHits;

#[async_trait]
impl ToolHandler for SummarizeSearchHits {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "summarize_search_hits".into(),
            description: "Rank previously returned search hits by relevance to a \
                          query and keep the best few."
                .into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Query to rank against"},
                    "hits": {
                        "type": "array",
                        "description": "Search hits from youtube_search or google_search",
                        "items": {"type": "object"}
                    },
                    "maxResults": {
                        "type": "integer",
                        "description": "How many top hits to keep"
                    }
                },
                "required": ["query", "hits"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let query = require_str(&args, "query")?.to_string();
        let hits: Vec<SearchHit> = args
            .get("hits")
            .cloned()
            .ok_or_else(|| ToolError::InvalidInput("missing required argument: hits".into()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| ToolError::InvalidInput(format!("malformed hits: {e}")))
            })?;
        let max_results = opt_count(&args, DEFAULT_MAX_RESULTS as u32) as usize;
        let ranked = rank_hits(&query, hits, max_results);
        Ok(json!({ "results": ranked }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// expand_selected_sources
// ─────────────────────────────────────────────────────────────────────────────

pub struct ExpandSelectedSources {
    fetcher: Arc<dyn SourceFetcher>,
}

impl ExpandSelectedSources {
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ToolHandler for ExpandSelectedSources {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "expand_selected_sources".into(),
            description: "Fetch full content for chosen sources: video transcripts, \
                          reddit threads, and web pages. Failures are reported \
                          per source."
                .into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "selections": {
                        "type": "array",
                        "description": "Sources to expand",
                        "items": {
                            "type": "object",
                            "properties": {
                                "type": {"type": "string", "enum": ["video", "reddit", "link"]},
                                "videoId": {"type": "string"},
                                "link": {"type": "string"},
                                "title": {"type": "string"}
                            }
                        }
                    }
                },
                "required": ["selections"]
            }),
        }
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let selections: Vec<Selection> = args
            .get("selections")
            .cloned()
            .ok_or_else(|| {
                ToolError::InvalidInput("missing required argument: selections".into())
            })
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| ToolError::InvalidInput(format!("malformed selections: {e}")))
            })?;
        let entries = expand_selections(self.fetcher.as_ref(), selections).await;
        Ok(json!({ "sources": entries }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use storage::Product;

    fn seeded_store() -> Arc<Mutex<ProductStore>> {
        let store = ProductStore::in_memory().unwrap();
        let product = Product::new("sku-1", "Aurora ANC Headphones")
            .with_price(199.99, "USD")
            .with_category("audio");
        store.upsert(&product).unwrap();
        Arc::new(Mutex::new(store))
    }

    #[tokio::test]
    async fn product_fetch_returns_catalog_record() {
        let handler = FetchProductDetails::new(seeded_store());
        let out = handler
            .run(json!({"product_id": "sku-1"}))
            .await
            .unwrap();
        assert_eq!(out["name"], "Aurora ANC Headphones");
        assert_eq!(out["price"], 199.99);
    }

    #[tokio::test]
    async fn product_fetch_reports_missing_product() {
        let handler = FetchProductDetails::new(seeded_store());
        let err = handler
            .run(json!({"product_id": "sku-404"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sku-404 not found"));
    }

    #[tokio::test]
    async fn product_fetch_rejects_missing_argument() {
        let handler = FetchProductDetails::new(seeded_store());
        let err = handler.run(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn summarize_ranks_and_truncates() {
        let args = json!({
            "query": "wireless headphones",
            "hits": [
                {"title": "Wireless headphones review", "snippet": "", "link": "https://a.example"},
                {"title": "Cast iron skillet", "snippet": "", "link": "https://b.example"}
            ],
            "maxResults": 1
        });
        let out = SummarizeSearchHits.run(args).await.unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "Wireless headphones review");
    }

    #[tokio::test]
    async fn summarize_rejects_malformed_hits() {
        let args = json!({"query": "q", "hits": "not-an-array"});
        let err = SummarizeSearchHits.run(args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn count_argument_accepts_both_spellings() {
        assert_eq!(opt_count(&json!({"maxResults": 3}), 10), 3);
        assert_eq!(opt_count(&json!({"max_results": 4}), 10), 4);
        assert_eq!(opt_count(&json!({}), 10), 10);
    }
}
