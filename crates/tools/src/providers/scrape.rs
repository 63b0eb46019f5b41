//! Reddit thread and generic page scraping.

use runtime::ToolError;
use serde_json::Value;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; shelfscout/0.1)";

/// Scraper for reddit threads and arbitrary web pages.
pub struct ScrapeClient {
    http: reqwest::Client,
}

impl ScrapeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the text of a reddit thread via its JSON listing.
    ///
    /// Collects post titles, selftext, and comment bodies in listing order.
    pub async fn thread_text(&self, url: &str) -> Result<String, ToolError> {
        let json_url = normalize_thread_url(url);
        let response = self
            .http
            .get(&json_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Upstream(format!(
                "thread fetch {}: {json_url}",
                response.status()
            )));
        }

        let listing: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Upstream(format!("thread parse: {e}")))?;

        let mut pieces = Vec::new();
        collect_thread_text(&listing, &mut pieces);
        if pieces.is_empty() {
            return Err(ToolError::Execution(format!("no text found in thread {url}")));
        }
        Ok(pieces.join("\n"))
    }

    /// Fetch a web page and reduce it to visible text.
    pub async fn page_text(&self, url: &str) -> Result<String, ToolError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Upstream(format!(
                "page fetch {}: {url}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;
        let text = strip_tags(&body);
        if text.is_empty() {
            return Err(ToolError::Execution(format!("no text found at {url}")));
        }
        Ok(text)
    }
}

impl Default for ScrapeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `.json` to a thread URL so reddit returns the listing payload.
fn normalize_thread_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(".json") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.json")
    }
}

/// Walk a reddit listing and pull out title, selftext, and comment bodies.
fn collect_thread_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in ["title", "selftext", "body"] {
                if let Some(Value::String(text)) = map.get(key) {
                    let text = text.trim();
                    if !text.is_empty() {
                        out.push(text.to_string());
                    }
                }
            }
            for child in map.values() {
                if matches!(child, Value::Object(_) | Value::Array(_)) {
                    collect_thread_text(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_thread_text(item, out);
            }
        }
        _ => {}
    }
}

/// Strip markup from an HTML document, keeping readable text.
pub fn strip_tags(html: &str) -> String {
    let without_blocks = remove_block(&remove_block(html, "script"), "style");

    let mut text = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for ch in without_blocks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ASCII-case-insensitive substring search over the original bytes.
///
/// Lowercasing the haystack first would shift byte offsets for characters
/// whose lowercase form has a different length, and the offsets are used to
/// slice the original. Matches start on an ASCII byte, so they always land
/// on a char boundary.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let ndl = needle.as_bytes();
    if from + ndl.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - ndl.len()).find(|&i| hay[i..i + ndl.len()].eq_ignore_ascii_case(ndl))
}

/// Remove `<tag ...>...</tag>` blocks, case-insensitively.
fn remove_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    while let Some(start) = find_ascii_ci(html, &open, cursor) {
        out.push_str(&html[cursor..start]);
        match find_ascii_ci(html, &close, start) {
            Some(end) => cursor = end + close.len(),
            // Unclosed block swallows the rest of the document.
            None => return out,
        }
    }
    out.push_str(&html[cursor..]);
    out
}
