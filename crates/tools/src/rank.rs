//! Candidate ranking by token overlap.
//!
//! Search hits from heterogeneous providers (video, web, social) are scored
//! against the user's query and classified by source type, so the model can
//! choose which candidates to expand.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Default number of ranked hits returned.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// A lightweight search result not yet deeply fetched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, alias = "videoId")]
    pub video_id: Option<String>,
}

/// Source classification for a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Video,
    Reddit,
    Link,
}

/// A scored, classified hit.
#[derive(Debug, Clone, Serialize)]
pub struct RankedHit {
    #[serde(rename = "type")]
    pub kind: HitKind,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// Lowercase alphanumeric tokens of the input.
fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a link's host falls under reddit.com.
pub(crate) fn is_reddit_link(link: &str) -> bool {
    let lower = link.to_lowercase();
    let host = lower
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&lower);
    let host = host.split('/').next().unwrap_or(host);
    host.contains("reddit.com")
}

/// Classify a hit by source type.
pub fn classify(hit: &SearchHit) -> HitKind {
    if hit.video_id.is_some() {
        HitKind::Video
    } else if hit.link.as_deref().is_some_and(is_reddit_link) {
        HitKind::Reddit
    } else {
        HitKind::Link
    }
}

/// Rank hits against a query by token overlap.
///
/// Score is `|hit tokens ∩ query tokens| / max(|query tokens|, 1)`, always in
/// `[0, 1]`. The sort is stable and descending, so ties keep their original
/// order; output length is `min(hits, max_results)`.
pub fn rank_hits(query: &str, hits: Vec<SearchHit>, max_results: usize) -> Vec<RankedHit> {
    let query_set = tokens(query);
    let denominator = query_set.len().max(1) as f64;

    let mut ranked: Vec<RankedHit> = hits
        .into_iter()
        .map(|hit| {
            let haystack = format!(
                "{} {}",
                hit.title.as_deref().unwrap_or(""),
                hit.snippet.as_deref().unwrap_or("")
            );
            let matches = tokens(&haystack).intersection(&query_set).count();
            RankedHit {
                kind: classify(&hit),
                score: matches as f64 / denominator,
                title: hit.title,
                snippet: hit.snippet,
                link: hit.link,
                video_id: hit.video_id,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(max_results);
    ranked
}
