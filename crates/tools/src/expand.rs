//! Candidate expansion: deep-fetch full content for selected sources.
//!
//! Each selection is processed independently; a failing fetch produces an
//! error entry for that candidate only and never aborts the rest. Processing
//! is sequential in the current design; the fetches are independent, so this
//! is safe to parallelize as long as entry order is preserved.

use async_trait::async_trait;
use runtime::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::rank::is_reddit_link;

/// Transcript excerpt cap for video selections.
pub const TRANSCRIPT_EXCERPT_CHARS: usize = 5_000;

/// Excerpt cap for scraped reddit threads.
pub const THREAD_EXCERPT_CHARS: usize = 20_000;

/// Excerpt cap for generic page fetches.
pub const PAGE_EXCERPT_CHARS: usize = 20_000;

/// How many leading transcript segments to include as metadata.
pub const TRANSCRIPT_PREVIEW_SEGMENTS: usize = 10;

/// One timed transcript segment.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A fetched video transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub duration: f64,
    pub language: String,
}

/// Deep-content fetching boundary, one method per source type.
///
/// Production uses [`WebFetcher`](crate::providers::WebFetcher); tests
/// substitute scripted implementations.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn transcript(&self, video_id: &str) -> Result<Transcript, ToolError>;

    async fn thread_text(&self, url: &str) -> Result<String, ToolError>;

    async fn page_text(&self, url: &str) -> Result<String, ToolError>;
}

/// A previously ranked candidate chosen for expansion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selection {
    /// Explicit type from the ranking step; inferred from shape when absent.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "videoId")]
    pub video_id: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Selection {
    fn resolved_kind(&self) -> &str {
        if let Some(kind) = self.kind.as_deref() {
            return kind;
        }
        if self.video_id.is_some() {
            "video"
        } else if self.link.as_deref().is_some_and(is_reddit_link) {
            "reddit"
        } else {
            "link"
        }
    }
}

/// Truncate to a character count without splitting a code point.
fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Expand each selection into full content, isolating per-item failures.
pub async fn expand_selections(
    fetcher: &dyn SourceFetcher,
    selections: Vec<Selection>,
) -> Vec<Value> {
    let mut entries = Vec::with_capacity(selections.len());
    for selection in selections {
        entries.push(expand_one(fetcher, selection).await);
    }
    entries
}

async fn expand_one(fetcher: &dyn SourceFetcher, selection: Selection) -> Value {
    let kind = selection.resolved_kind().to_string();
    debug!(kind = %kind, "expanding selection");

    match kind.as_str() {
        "video" => {
            let Some(video_id) = selection.video_id.clone() else {
                return error_entry("video", "", "selection missing videoId");
            };
            match fetcher.transcript(&video_id).await {
                Ok(transcript) => {
                    let preview =
                        &transcript.segments[..TRANSCRIPT_PREVIEW_SEGMENTS.min(transcript.segments.len())];
                    json!({
                        "type": "video",
                        "id": video_id,
                        "title": selection.title,
                        "transcript_excerpt": excerpt(&transcript.text, TRANSCRIPT_EXCERPT_CHARS),
                        "duration": transcript.duration,
                        "language": transcript.language,
                        "segments": preview,
                    })
                }
                Err(err) => error_entry("video", &video_id, &err.to_string()),
            }
        }
        "reddit" => {
            let Some(link) = selection.link.clone() else {
                return error_entry("reddit", "", "selection missing link");
            };
            match fetcher.thread_text(&link).await {
                Ok(text) => json!({
                    "type": "reddit",
                    "id": link,
                    "title": selection.title,
                    "excerpt": excerpt(&text, THREAD_EXCERPT_CHARS),
                }),
                Err(err) => error_entry("reddit", &link, &err.to_string()),
            }
        }
        other => {
            let Some(link) = selection.link.clone() else {
                return error_entry(other, "", "selection missing link");
            };
            match fetcher.page_text(&link).await {
                Ok(text) => json!({
                    "type": "link",
                    "id": link,
                    "title": selection.title,
                    "excerpt": excerpt(&text, PAGE_EXCERPT_CHARS),
                }),
                Err(err) => error_entry("link", &link, &err.to_string()),
            }
        }
    }
}

fn error_entry(kind: &str, id: &str, message: &str) -> Value {
    json!({
        "type": kind,
        "id": id,
        "error": message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockFetcher;

    #[async_trait]
    impl SourceFetcher for MockFetcher {
        async fn transcript(&self, video_id: &str) -> Result<Transcript, ToolError> {
            if video_id == "vid-1" {
                Ok(Transcript {
                    text: "great value headphones ".repeat(400),
                    segments: (0..20)
                        .map(|i| TranscriptSegment {
                            text: format!("segment {i}"),
                            start: i as f64,
                            duration: 1.0,
                        })
                        .collect(),
                    duration: 20.0,
                    language: "en".into(),
                })
            } else {
                Err(ToolError::Execution("transcript not available".into()))
            }
        }

        async fn thread_text(&self, _url: &str) -> Result<String, ToolError> {
            Err(ToolError::Upstream("connect failed: host unreachable".into()))
        }

        async fn page_text(&self, _url: &str) -> Result<String, ToolError> {
            Ok("plain page text".into())
        }
    }

    #[test]
    fn transcript_serializes_whole() {
        let transcript = Transcript {
            text: "sound great".into(),
            segments: vec![TranscriptSegment {
                text: "sound great".into(),
                start: 0.0,
                duration: 2.0,
            }],
            duration: 2.0,
            language: "en".into(),
        };
        let value = serde_json::to_value(transcript).unwrap();
        assert_eq!(value["text"], "sound great");
        assert_eq!(value["segments"][0]["start"], 0.0);
        assert_eq!(value["language"], "en");
    }

    #[tokio::test]
    async fn partial_failure_is_isolated() {
        let selections = vec![
            Selection {
                video_id: Some("vid-1".into()),
                ..Selection::default()
            },
            Selection {
                link: Some("https://reddit.com/r/audio/comments/dead".into()),
                ..Selection::default()
            },
        ];

        let entries = expand_selections(&MockFetcher, selections).await;
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0]["type"], "video");
        assert!(entries[0]["transcript_excerpt"].as_str().unwrap().len() > 0);
        assert!(entries[0].get("error").is_none());

        assert_eq!(entries[1]["type"], "reddit");
        assert!(entries[1]["error"].as_str().unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn transcript_excerpt_is_capped() {
        let selections = vec![Selection {
            video_id: Some("vid-1".into()),
            ..Selection::default()
        }];
        let entries = expand_selections(&MockFetcher, selections).await;

        let text = entries[0]["transcript_excerpt"].as_str().unwrap();
        assert_eq!(text.chars().count(), TRANSCRIPT_EXCERPT_CHARS);
        let segments = entries[0]["segments"].as_array().unwrap();
        assert_eq!(segments.len(), TRANSCRIPT_PREVIEW_SEGMENTS);
    }

    #[tokio::test]
    async fn kind_inference_falls_back_by_shape() {
        let selections = vec![Selection {
            link: Some("https://example.com/review".into()),
            ..Selection::default()
        }];
        let entries = expand_selections(&MockFetcher, selections).await;
        assert_eq!(entries[0]["type"], "link");
        assert_eq!(entries[0]["excerpt"], "plain page text");
    }

    #[tokio::test]
    async fn missing_fields_produce_error_entries() {
        let selections = vec![Selection {
            kind: Some("video".into()),
            ..Selection::default()
        }];
        let entries = expand_selections(&MockFetcher, selections).await;
        assert!(entries[0]["error"].as_str().unwrap().contains("videoId"));
    }
}
