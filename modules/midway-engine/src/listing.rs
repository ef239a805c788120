//! Rendered-list fetching — pull a fully rendered list page through a
//! headless-browser service and extract place entries from its DOM.
//!
//! List pages are JavaScript applications; the raw document carries no
//! entries. The browser service renders the page and returns the final
//! HTML, which is then scanned for place anchors.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use midway_common::{MidwayError, ObservedPlace, SourceBatch, SourceDescriptor};

use crate::traits::SourceFetcher;

/// Marker text a list page renders next to an entry that no longer exists.
const CLOSED_MARKER: &str = "Permanently closed";

/// Fetches list pages through a Browserless-style `/content` endpoint and
/// parses place entries out of the rendered HTML.
pub struct RenderedListFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    entry_re: Regex,
}

impl RenderedListFetcher {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MidwayError::Fetch(format!("build http client: {e}")))?;

        // Place entries render as anchors into the place detail page; the
        // accessible label carries the display name.
        let entry_re =
            Regex::new(r#"<a[^>]*href="[^"]*/maps/place/[^"]*"[^>]*aria-label="([^"]+)""#)
                .map_err(|e| MidwayError::Fetch(format!("entry pattern: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            entry_re,
        })
    }

    async fn render(&self, url: &str) -> Result<String> {
        let endpoint = match &self.token {
            Some(token) => format!("{}/content?token={token}", self.base_url),
            None => format!("{}/content", self.base_url),
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| MidwayError::Fetch(format!("render request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MidwayError::Fetch(format!("render returned {status}")).into());
        }

        response
            .text()
            .await
            .map_err(|e| MidwayError::Fetch(format!("render body: {e}")).into())
    }

    /// Extract entries from rendered HTML. Ordered by first appearance;
    /// duplicate names collapse to the first occurrence. An entry is
    /// closed when the closed marker appears between its anchor and the
    /// next one.
    fn parse_entries(&self, html: &str) -> Vec<ObservedPlace> {
        let anchors: Vec<(usize, String)> = self
            .entry_re
            .captures_iter(html)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let name = unescape(caps.get(1)?.as_str());
                (!name.is_empty()).then_some((start, name))
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for (i, (start, name)) in anchors.iter().enumerate() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let end = anchors
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(html.len());
            entries.push(ObservedPlace {
                name: name.clone(),
                permanently_closed: html[*start..end].contains(CLOSED_MARKER),
            });
        }
        entries
    }
}

#[async_trait]
impl SourceFetcher for RenderedListFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<SourceBatch> {
        let parsed = url::Url::parse(&source.url)
            .map_err(|e| MidwayError::Fetch(format!("invalid source url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(
                MidwayError::Fetch(format!("unsupported scheme: {}", parsed.scheme())).into(),
            );
        }

        debug!(label = source.label.as_str(), url = source.url.as_str(), "Rendering list page");
        let html = self.render(&source.url).await?;
        if html.trim().is_empty() {
            // An empty render is a transient service hiccup, not an empty list.
            bail!("rendered page was empty");
        }

        let entries = self.parse_entries(&html);
        info!(
            label = source.label.as_str(),
            entries = entries.len(),
            "List page parsed"
        );
        Ok(SourceBatch {
            list_label: source.label.clone(),
            entries,
        })
    }
}

/// Decode the HTML entities the list pages actually emit in labels.
/// `&amp;` must be handled last so `&amp;lt;` does not double-decode.
fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
