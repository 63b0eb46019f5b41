//! YouTube Data API search and timedtext transcript fetch.

use chrono::{DateTime, Utc};
use runtime::ToolError;
use serde::{Deserialize, Serialize};

use crate::expand::{Transcript, TranscriptSegment};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

/// Default number of search results requested.
pub const DEFAULT_SEARCH_RESULTS: u32 = 10;

/// A video search hit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoHit {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

// --- Data API wire types ---

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    items: Vec<ApiSearchItem>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchItem {
    id: ApiVideoId,
    snippet: ApiSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideoId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

// --- Timedtext (json3) wire types ---

#[derive(Debug, Deserialize)]
struct TimedTextResponse {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(default, rename = "tStartMs")]
    start_ms: f64,
    #[serde(default, rename = "dDurationMs")]
    duration_ms: f64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

/// Best-effort English check: ASCII-only text is assumed English.
///
/// This is a documented heuristic, not a verified classifier: transcripts
/// with accented proper nouns or any non-ASCII punctuation are reported as
/// "unknown" even when they are English.
pub fn guess_language(text: &str) -> &'static str {
    if text.is_ascii() { "en" } else { "unknown" }
}

/// YouTube API client.
pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Search for videos matching a query.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoHit>, ToolError> {
        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", &max_results.to_string()),
                ("key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream(format!("youtube search {status}: {body}")));
        }

        let parsed: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("youtube search parse: {e}")))?;

        Ok(parsed
            .items
            .into_iter()
            .filter_map(|item| {
                Some(VideoHit {
                    video_id: item.id.video_id?,
                    title: item.snippet.title,
                    description: item.snippet.description,
                    channel_title: item.snippet.channel_title,
                    published_at: item.snippet.published_at,
                })
            })
            .collect())
    }

    /// Fetch the English caption track for a video.
    ///
    /// YouTube serves an empty body when no track exists; both that and a
    /// parse failure surface as "transcript not available".
    pub async fn transcript(&self, video_id: &str) -> Result<Transcript, ToolError> {
        let response = self
            .http
            .get(TIMEDTEXT_URL)
            .query(&[("v", video_id), ("lang", "en"), ("fmt", "json3")])
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Execution(format!(
                "transcript not available for {video_id}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;
        parse_timedtext(video_id, &body)
    }
}

fn parse_timedtext(video_id: &str, body: &str) -> Result<Transcript, ToolError> {
    if body.trim().is_empty() {
        return Err(ToolError::Execution(format!(
            "transcript not available for {video_id}"
        )));
    }

    let parsed: TimedTextResponse = serde_json::from_str(body).map_err(|_| {
        ToolError::Execution(format!("transcript not available for {video_id}"))
    })?;

    let mut segments = Vec::new();
    let mut duration: f64 = 0.0;
    for event in parsed.events {
        // Whitespace-only events still extend the track duration.
        duration = duration.max((event.start_ms + event.duration_ms) / 1000.0);
        let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        segments.push(TranscriptSegment {
            text,
            start: event.start_ms / 1000.0,
            duration: event.duration_ms / 1000.0,
        });
    }

    if segments.is_empty() {
        return Err(ToolError::Execution(format!(
            "transcript not available for {video_id}"
        )));
    }

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let language = guess_language(&text).to_string();

    Ok(Transcript {
        text,
        segments,
        duration,
        language,
    })
}
