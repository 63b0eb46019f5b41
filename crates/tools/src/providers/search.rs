//! Web search via the Custom Search JSON API.

use runtime::ToolError;
use serde::{Deserialize, Serialize};

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Default number of web results requested.
pub const DEFAULT_SEARCH_RESULTS: u32 = 10;

/// A web search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    items: Vec<WebHit>,
}

/// Custom Search API client.
pub struct SearchClient {
    http: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl SearchClient {
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }

    /// Search the web for a query.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebHit>, ToolError> {
        // The API caps num at 10.
        let num = max_results.clamp(1, 10);
        let response = self
            .http
            .get(CUSTOM_SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", &num.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream(format!("web search {status}: {body}")));
        }

        let parsed: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("web search parse: {e}")))?;
        Ok(parsed.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_with_missing_fields() {
        let body = r#"{"items": [{"title": "Review", "link": "https://example.com"}]}"#;
        let parsed: ApiSearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].snippet, "");
    }

    #[test]
    fn empty_response_is_no_hits() {
        let parsed: ApiSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.items.is_empty());
    }
}
